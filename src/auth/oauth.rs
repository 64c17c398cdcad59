//! OAuth2 device code flow against Google, yielding a Google ID token

use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, Client, ClientId, ClientSecret, DeviceAuthorizationUrl, ExtraTokenFields,
    Scope, StandardDeviceAuthorizationResponse, StandardRevocableToken, StandardTokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};

use super::{AuthError, DevicePrompt, PromptSink};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_DEVICE_URL: &str = "https://oauth2.googleapis.com/device/code";

/// Scopes that make Google return an OpenID Connect ID token.
const SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Google OAuth client registered for the "TVs and limited input" type.
#[derive(Debug, Clone)]
pub struct GoogleClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Extra token response field carrying the OpenID Connect ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type GoogleClient = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

fn oauth_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::OAuth(e.to_string())
}

/// Build the OAuth2 client for Google's endpoints.
fn build_client(config: &GoogleClientConfig) -> Result<GoogleClient, AuthError> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(oauth_err)?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(oauth_err)?;
    let device_url = DeviceAuthorizationUrl::new(GOOGLE_DEVICE_URL.to_string()).map_err(oauth_err)?;

    Ok(GoogleClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody)
    .set_device_authorization_url(device_url))
}

/// Run the device code flow and return the Google ID token.
///
/// The verification URL and user code are handed to `prompt`; this call then
/// polls until the user approves, denies, or the code expires.
pub async fn device_login(
    config: &GoogleClientConfig,
    prompt: &PromptSink,
) -> Result<String, AuthError> {
    let client = build_client(config)?;

    tracing::info!("Initiating Google device code flow...");

    let mut request = client.exchange_device_code().map_err(oauth_err)?;
    for scope in SCOPES {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let details: StandardDeviceAuthorizationResponse = request
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .map_err(oauth_err)?;

    prompt(DevicePrompt {
        verification_url: details.verification_uri().as_str().to_string(),
        user_code: details.user_code().secret().to_string(),
    });

    tracing::info!("Waiting for authentication...");

    let token = client
        .exchange_device_access_token(&details)
        .request_async(oauth2::reqwest::async_http_client, tokio::time::sleep, None)
        .await
        .map_err(oauth_err)?;

    token
        .extra_fields()
        .id_token
        .clone()
        .ok_or(AuthError::MissingIdToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_token_field_parses_from_token_response() {
        let raw = r#"{
            "access_token": "ya29.x",
            "token_type": "Bearer",
            "expires_in": 3599,
            "id_token": "eyJ.header.sig"
        }"#;
        let parsed: GoogleTokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.extra_fields().id_token.as_deref(), Some("eyJ.header.sig"));
    }

    #[test]
    fn test_build_client_accepts_google_endpoints() {
        let config = GoogleClientConfig {
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
        };
        assert!(build_client(&config).is_ok());
    }
}
