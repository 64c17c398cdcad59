//! Firestore REST backend
//!
//! Reads use `documents:runQuery` ordered by `createdAt`; creation uses
//! `documents:commit` so the store can stamp `createdAt` with its own clock;
//! deletion is a plain `DELETE` on the document. The live subscription is a
//! polling listener that only yields when the collection actually changed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::time;

use super::{FeedQuery, MessageStore, Snapshot, SnapshotStream, StoreError};
use crate::auth::firebase::FirebaseAuth;
use crate::models::{CreatedAt, Identity, Message, MessageId, NewMessage};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

/// Upper bound for the retry delay after failed polls.
const MAX_BACKOFF_SECS: u64 = 64;

/// Connection settings for one Firestore collection.
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub api_key: String,
    pub collection: String,
    pub poll_interval: Duration,
}

/// Firestore-backed message store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Arc<RestClient>,
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings, auth: Arc<FirebaseAuth>) -> Self {
        Self {
            client: Arc::new(RestClient {
                http: reqwest::Client::new(),
                settings,
                auth,
            }),
        }
    }
}

struct RestClient {
    http: reqwest::Client,
    settings: FirestoreSettings,
    auth: Arc<FirebaseAuth>,
}

impl RestClient {
    /// `projects/{p}/databases/(default)/documents`
    fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.settings.project_id
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", FIRESTORE_BASE, self.documents_path())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .query(&[("key", self.settings.api_key.as_str())])
    }

    async fn optional_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.auth.id_token().await?)
    }

    async fn required_token(&self) -> Result<String, StoreError> {
        self.optional_token()
            .await?
            .ok_or(StoreError::Unauthenticated)
    }

    /// Fetch the windowed collection, ascending by `createdAt`.
    async fn run_query(&self, query: FeedQuery) -> Result<Vec<Message>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url());
        let body = run_query_body(&self.settings.collection, query);

        let mut req = self.request(reqwest::Method::POST, &url).json(&body);
        if let Some(token) = self.optional_token().await? {
            req = req.bearer_auth(token);
        }

        tracing::debug!("Firestore runQuery {}", url);
        let resp = send(req, &url).await?;
        let items: Vec<RunQueryItem> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("runQuery response: {}", e)))?;

        let mut messages: Vec<Message> = items
            .into_iter()
            .filter_map(|item| item.document)
            .filter_map(|doc| match decode_document(doc) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!("Skipping malformed message document: {}", e);
                    None
                }
            })
            .collect();

        // Windowed queries fetch newest-first.
        if query.limit.is_some() {
            messages.reverse();
        }
        Ok(messages)
    }

    async fn commit(&self, message: &NewMessage) -> Result<MessageId, StoreError> {
        let token = self.required_token().await?;
        let id = MessageId::new(uuid::Uuid::new_v4().simple().to_string());
        let name = format!(
            "{}/{}/{}",
            self.documents_path(),
            self.settings.collection,
            id
        );
        let url = format!("{}:commit", self.documents_url());
        let body = commit_body(&name, message);

        tracing::debug!("Firestore commit {}", name);
        let req = self
            .request(reqwest::Method::POST, &url)
            .bearer_auth(token)
            .json(&body);
        send(req, &url).await?;
        Ok(id)
    }

    async fn remove(&self, id: &MessageId, actor: &Identity) -> Result<(), StoreError> {
        let token = self.required_token().await?;
        let url = format!(
            "{}/{}/{}",
            self.documents_url(),
            self.settings.collection,
            id
        );

        tracing::debug!("Firestore DELETE {}", url);
        let req = self
            .request(reqwest::Method::DELETE, &url)
            .query(&[("currentDocument.exists", "true")])
            .bearer_auth(token);

        match send(req, &url).await {
            Err(StoreError::Http { status: 403, .. }) => Err(StoreError::PermissionDenied {
                id: id.clone(),
                actor: actor.uid.clone(),
            }),
            Err(StoreError::Http { status: 404, .. }) => Err(StoreError::NotFound(id.clone())),
            other => other.map(|_| ()),
        }
    }
}

/// Send a request and turn transport failures and non-2xx replies into errors.
async fn send(req: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, StoreError> {
    let resp = req.send().await.map_err(|source| StoreError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(StoreError::Unauthenticated);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StoreError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

impl MessageStore for FirestoreStore {
    fn subscribe(&self, query: FeedQuery) -> SnapshotStream {
        let state = PollState {
            client: Arc::clone(&self.client),
            query,
            last: None,
            started: false,
            backoff_secs: 0,
        };
        let collection = self.client.settings.collection.clone();
        tracing::info!("Subscribing to Firestore collection '{}'", collection);

        SnapshotStream::new(futures::stream::unfold(state, poll_changes), move || {
            tracing::info!("Released Firestore subscription to '{}'", collection);
        })
    }

    fn create(&self, message: NewMessage) -> BoxFuture<'_, Result<MessageId, StoreError>> {
        async move { self.client.commit(&message).await }.boxed()
    }

    fn delete<'a>(
        &'a self,
        id: &'a MessageId,
        actor: &'a Identity,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        async move { self.client.remove(id, actor).await }.boxed()
    }
}

// ---------------------------------------------------------------------------
// Polling listener
// ---------------------------------------------------------------------------

struct PollState {
    client: Arc<RestClient>,
    query: FeedQuery,
    /// Last delivered contents; polls that match it are not re-emitted.
    last: Option<Vec<Message>>,
    started: bool,
    /// Non-zero while recovering from failed polls.
    backoff_secs: u64,
}

impl PollState {
    fn next_delay(&self) -> Duration {
        if self.backoff_secs > 0 {
            Duration::from_secs(self.backoff_secs)
        } else {
            self.client.settings.poll_interval
        }
    }
}

/// One step of the listener: poll until the collection differs from the last
/// delivered snapshot. Failed polls are logged and retried with backoff.
async fn poll_changes(mut state: PollState) -> Option<(Snapshot, PollState)> {
    loop {
        if state.started {
            time::sleep(state.next_delay()).await;
        }
        state.started = true;

        match state.client.run_query(state.query).await {
            Ok(messages) => {
                state.backoff_secs = 0;
                if state.last.as_ref() != Some(&messages) {
                    state.last = Some(messages.clone());
                    return Some((Snapshot::new(messages), state));
                }
            }
            Err(e) => {
                state.backoff_secs = (state.backoff_secs * 2).clamp(1, MAX_BACKOFF_SECS);
                tracing::warn!(
                    "Feed poll failed: {}. Retrying in {}s...",
                    e,
                    state.backoff_secs
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, TypedValue>,
}

/// Firestore typed value; only the variants this collection uses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    string_value: Option<String>,
    timestamp_value: Option<String>,
}

fn run_query_body(collection: &str, query: FeedQuery) -> Value {
    let direction = if query.limit.is_some() {
        "DESCENDING"
    } else {
        "ASCENDING"
    };
    let mut structured = json!({
        "from": [{ "collectionId": collection }],
        "orderBy": [{ "field": { "fieldPath": "createdAt" }, "direction": direction }],
    });
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    json!({ "structuredQuery": structured })
}

fn string_field(value: &Option<String>) -> Value {
    match value {
        Some(s) => json!({ "stringValue": s }),
        None => json!({ "nullValue": null }),
    }
}

fn commit_body(name: &str, message: &NewMessage) -> Value {
    let mut fields = Map::new();
    fields.insert("uid".into(), json!({ "stringValue": message.uid }));
    fields.insert("text".into(), json!({ "stringValue": message.text }));
    fields.insert("author".into(), string_field(&message.author));
    fields.insert("pfp".into(), string_field(&message.pfp));
    fields.insert("mail".into(), string_field(&message.mail));

    let mut write = json!({
        "update": { "name": name },
        "currentDocument": { "exists": false },
    });

    match message.created_at {
        CreatedAt::ServerTimestamp => {
            write["updateTransforms"] = json!([
                { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
            ]);
        }
        CreatedAt::Explicit(ts) => {
            fields.insert(
                "createdAt".into(),
                json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) }),
            );
        }
    }
    write["update"]["fields"] = Value::Object(fields);

    json!({ "writes": [write] })
}

fn decode_document(doc: Document) -> Result<Message, StoreError> {
    let id = doc
        .name
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreError::Decode(format!("document name '{}'", doc.name)))?
        .to_string();

    let string = |key: &str| -> Option<String> {
        doc.fields.get(key).and_then(|v| v.string_value.clone())
    };

    let author_uid = string("uid")
        .ok_or_else(|| StoreError::Decode(format!("document {} has no uid", id)))?;

    let created_at = match doc.fields.get("createdAt").and_then(|v| v.timestamp_value.as_deref()) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| StoreError::Decode(format!("createdAt '{}': {}", raw, e)))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(Message {
        id: MessageId::new(id),
        author_uid,
        author_display_name: string("author"),
        author_email: string("mail"),
        author_avatar_url: string("pfp"),
        text: string("text").unwrap_or_default(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> Identity {
        Identity {
            uid: "u1".to_string(),
            display_name: Some("Alice".to_string()),
            email: Some("a@x.com".to_string()),
            photo_url: Some("p".to_string()),
        }
    }

    #[test]
    fn test_decode_run_query_response() {
        let raw = r#"[
          {"readTime": "2024-01-01T00:00:00Z"},
          {"document": {
            "name": "projects/demo/databases/(default)/documents/messages/abc123",
            "fields": {
              "uid": {"stringValue": "u1"},
              "text": {"stringValue": "  two  spaces\n"},
              "author": {"stringValue": "Alice"},
              "mail": {"stringValue": "a@x.com"},
              "pfp": {"nullValue": null},
              "createdAt": {"timestampValue": "2024-01-01T10:30:00.123456Z"}
            }
          }},
          {"document": {
            "name": "projects/demo/databases/(default)/documents/messages/pending",
            "fields": {
              "uid": {"stringValue": "u2"},
              "text": {"stringValue": "hi"}
            }
          }}
        ]"#;

        let items: Vec<RunQueryItem> = serde_json::from_str(raw).unwrap();
        let docs: Vec<Message> = items
            .into_iter()
            .filter_map(|i| i.document)
            .map(|d| decode_document(d).unwrap())
            .collect();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_str(), "abc123");
        assert_eq!(docs[0].text, "  two  spaces\n");
        assert_eq!(docs[0].author_display_name.as_deref(), Some("Alice"));
        assert_eq!(docs[0].author_avatar_url, None);
        assert_eq!(
            docs[0].created_at.map(|t| t.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap().timestamp())
        );
        assert_eq!(docs[1].created_at, None);
    }

    #[test]
    fn test_decode_rejects_missing_uid() {
        let doc = Document {
            name: "projects/p/databases/(default)/documents/messages/x".to_string(),
            fields: HashMap::new(),
        };
        assert!(matches!(decode_document(doc), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_commit_body_requests_server_timestamp() {
        let new = NewMessage::from_identity(&alice(), "hello");
        let body = commit_body("projects/p/databases/(default)/documents/messages/id1", &new);

        let write = &body["writes"][0];
        assert_eq!(write["update"]["fields"]["uid"]["stringValue"], "u1");
        assert_eq!(write["update"]["fields"]["text"]["stringValue"], "hello");
        assert_eq!(write["update"]["fields"]["author"]["stringValue"], "Alice");
        assert_eq!(write["update"]["fields"]["mail"]["stringValue"], "a@x.com");
        assert_eq!(write["update"]["fields"]["pfp"]["stringValue"], "p");
        assert!(write["update"]["fields"].get("createdAt").is_none());
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "createdAt");
        assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
        assert_eq!(write["currentDocument"]["exists"], false);
    }

    #[test]
    fn test_commit_body_explicit_timestamp() {
        let mut new = NewMessage::from_identity(&alice(), "hello");
        new.created_at = CreatedAt::Explicit(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        let body = commit_body("n", &new);

        let write = &body["writes"][0];
        assert_eq!(
            write["update"]["fields"]["createdAt"]["timestampValue"],
            "2024-05-01T08:00:00.000000Z"
        );
        assert!(write.get("updateTransforms").is_none());
    }

    #[test]
    fn test_run_query_body_window() {
        let windowed = run_query_body("messages", FeedQuery::latest(50));
        assert_eq!(windowed["structuredQuery"]["limit"], 50);
        assert_eq!(
            windowed["structuredQuery"]["orderBy"][0]["direction"],
            "DESCENDING"
        );

        let all = run_query_body("messages", FeedQuery::all());
        assert!(all["structuredQuery"].get("limit").is_none());
        assert_eq!(all["structuredQuery"]["orderBy"][0]["direction"], "ASCENDING");
        assert_eq!(
            all["structuredQuery"]["from"][0]["collectionId"],
            "messages"
        );
    }
}
