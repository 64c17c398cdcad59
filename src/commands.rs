//! One-shot CLI commands.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::chat::{can_delete, ComposeState, DeleteRequest, LiveFeed, SubmitOutcome};
use crate::config::{BackendKind, Config};
use crate::context::ChatContext;
use crate::models::{Message, MessageId};
use crate::store::FeedQuery;

/// How long `read` and `delete` wait for the first snapshot.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn login(ctx: &ChatContext, force: bool) -> Result<()> {
    if let Some(identity) = ctx.session.current_identity() {
        if !force {
            println!(
                "Already signed in as {}. Use --force to sign in again.",
                identity.label()
            );
            return Ok(());
        }
    }

    tracing::info!("Starting sign-in...");
    let identity = ctx.session.sign_in().await?;
    println!("Signed in as {} ({})", identity.label(), identity.uid);
    Ok(())
}

pub async fn logout(ctx: &ChatContext) -> Result<()> {
    ctx.session.sign_out().await?;
    println!("Signed out.");
    Ok(())
}

pub async fn status(ctx: &ChatContext) -> Result<()> {
    println!("Backend:     {}", backend_name(ctx.backend));
    println!("Config:      {}", Config::config_path()?.display());

    match ctx.session.current_identity() {
        Some(identity) => println!("Signed in:   {} ({})", identity.label(), identity.uid),
        None => println!("Signed in:   no"),
    }

    if let Some(auth) = &ctx.firebase {
        match auth.stored_session().await {
            Some(session) if !session.id_token.is_expired() => {
                println!("ID token:    valid");
                if let Some(exp) = session.id_token.expires_at {
                    println!("  expires_at: {}", exp);
                }
            }
            Some(_) => println!("ID token:    expired (refreshed on next use)"),
            None => println!("ID token:    none"),
        }
    }

    match ctx.query.limit {
        Some(n) => println!("Feed window: newest {}", n),
        None => println!("Feed window: everything"),
    }
    Ok(())
}

pub async fn whoami(ctx: &ChatContext) -> Result<()> {
    let identity = ctx
        .session
        .current_identity()
        .context("Not signed in. Run `livefeed-chat login` first.")?;

    println!("uid:   {}", identity.uid);
    println!("name:  {}", identity.display_name.as_deref().unwrap_or("-"));
    println!("email: {}", identity.email.as_deref().unwrap_or("-"));
    println!("photo: {}", identity.photo_url.as_deref().unwrap_or("-"));
    Ok(())
}

pub async fn read(ctx: &ChatContext, limit: Option<usize>) -> Result<()> {
    let query = feed_query(ctx, limit);
    let feed = first_snapshot(ctx, query).await?;

    if feed.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let me = ctx.session.current_identity();
    for msg in feed.messages() {
        let own = can_delete(msg, me.as_ref());
        println!("{}", format_line(msg, own));
    }
    Ok(())
}

/// Print the feed, then every new message until Ctrl+C.
pub async fn watch(ctx: &ChatContext, limit: Option<usize>) -> Result<()> {
    let query = feed_query(ctx, limit);
    let mut feed = LiveFeed::mount(ctx.store.as_ref(), query);
    let mut seen: HashSet<MessageId> = HashSet::new();

    eprintln!("Watching the feed. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            more = feed.next_snapshot() => {
                if !more {
                    bail!("Feed subscription ended");
                }
                let me = ctx.session.current_identity();
                for msg in feed.messages() {
                    if seen.insert(msg.id.clone()) {
                        println!("{}", format_line(msg, can_delete(msg, me.as_ref())));
                    }
                }
                // Deleted ids drop out so the set tracks the window.
                seen.retain(|id| feed.find(id).is_some());
            }
        }
    }

    feed.unmount();
    Ok(())
}

pub async fn send(ctx: &ChatContext, text: &str) -> Result<()> {
    let identity = ctx.session.current_identity();
    if identity.is_none() {
        bail!("Not signed in. Run `livefeed-chat login` first.");
    }

    let mut compose = ComposeState::default();
    compose.set_text(text);
    match compose.submit(identity.as_ref(), ctx.store.as_ref()).await? {
        SubmitOutcome::Sent(id) => println!("Message sent ({}).", id),
        SubmitOutcome::Ignored => println!("Nothing to send: message is empty."),
    }
    Ok(())
}

pub async fn delete(ctx: &ChatContext, id: &str, yes: bool) -> Result<()> {
    let identity = ctx
        .session
        .current_identity()
        .context("Not signed in. Run `livefeed-chat login` first.")?;

    let id = MessageId::new(id);
    let feed = first_snapshot(ctx, FeedQuery::all()).await?;
    let message = feed
        .find(&id)
        .with_context(|| format!("No message with id {}", id))?;

    let Some(request) = DeleteRequest::open(message, Some(&identity)) else {
        bail!("Only the author can delete message {}", id);
    };

    let question = format!("Delete \"{}\" for everyone?", request.preview());
    if !yes && !tokio::task::spawn_blocking(move || confirm(&question)).await?? {
        request.cancel();
        println!("Cancelled.");
        return Ok(());
    }

    let removed = request.confirm(ctx.store.as_ref()).await?;
    println!("Message {} deleted.", removed);
    Ok(())
}

/// Mount, wait for one snapshot, release.
async fn first_snapshot(ctx: &ChatContext, query: FeedQuery) -> Result<LiveFeed> {
    let mut feed = LiveFeed::mount(ctx.store.as_ref(), query);
    let got = tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, feed.next_snapshot())
        .await
        .context("Timed out waiting for the message feed")?;
    feed.unmount();
    if !got {
        bail!("Feed subscription ended before delivering messages");
    }
    Ok(feed)
}

/// `--limit` overrides the configured window; 0 shows everything.
fn feed_query(ctx: &ChatContext, limit: Option<usize>) -> FeedQuery {
    limit.map(FeedQuery::from_limit).unwrap_or(ctx.query)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn backend_name(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::Firebase => "firebase",
        BackendKind::Local => "local",
    }
}

/// `[time] author: text`, with the id for messages the viewer may delete.
fn format_line(msg: &Message, own: bool) -> String {
    let time = msg.formatted_time().unwrap_or_else(|| "pending".to_string());
    let mut line = format!("[{}] {}: {}", time, msg.author_label(), msg.text);
    if own {
        line.push_str(&format!("  ({})", msg.id));
    }
    line
}
