//! Session command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use palaver_core::store::{SessionPatch, SessionStore};

pub fn list(store: &Arc<SessionStore>) -> Result<()> {
    let active = store.active_id();
    let now = Utc::now();
    let mut sessions = store.sessions();
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for session in sessions {
        let marker = if session.id == active { "*" } else { " " };
        let title = if session.title.is_empty() {
            "(untitled)"
        } else {
            session.title.as_str()
        };
        println!(
            "{marker} {title}  {}  {}  {}",
            session.id,
            session.model,
            format_age(session.updated_at, now)
        );
    }
    Ok(())
}

pub fn show(store: &Arc<SessionStore>, id: &str) -> Result<()> {
    let session = store
        .session(id)
        .with_context(|| format!("unknown session '{id}'"))?;

    let title = if session.title.is_empty() {
        "(untitled)"
    } else {
        session.title.as_str()
    };
    println!("{title}  [{}]", session.model);
    if session.has_document {
        let names: Vec<_> = session.files.iter().map(|f| f.name.as_str()).collect();
        println!("documents: {}", names.join(", "));
    }
    for message in &session.messages {
        println!();
        println!("{}: {}", message.role.as_str(), message.content);
    }
    Ok(())
}

pub fn new(store: &Arc<SessionStore>) -> Result<()> {
    let id = store.add_session();
    println!("Created session {id}");
    Ok(())
}

pub fn activate(store: &Arc<SessionStore>, id: &str) -> Result<()> {
    store
        .session(id)
        .with_context(|| format!("unknown session '{id}'"))?;
    store.set_active(id);
    println!("Active session is now {id}");
    Ok(())
}

pub fn rename(store: &Arc<SessionStore>, id: &str, title: &str) -> Result<()> {
    store
        .session(id)
        .with_context(|| format!("unknown session '{id}'"))?;
    store.update_session(
        id,
        SessionPatch {
            title: Some(title.to_string()),
            ..SessionPatch::default()
        },
    );
    println!("Renamed session {id} → {title}");
    Ok(())
}

pub fn delete(store: &Arc<SessionStore>, id: &str) -> Result<()> {
    store
        .session(id)
        .with_context(|| format!("unknown session '{id}'"))?;
    store.delete_session(id);
    println!("Deleted session {id}");
    Ok(())
}

pub fn clear(store: &Arc<SessionStore>, id: &str) -> Result<()> {
    store
        .session(id)
        .with_context(|| format!("unknown session '{id}'"))?;
    store.clear_messages(id);
    println!("Cleared session {id}");
    Ok(())
}

/// Compact relative age for the session list.
fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let secs = delta.num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = delta.num_minutes();
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = delta.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = delta.num_days();
    if days < 30 {
        return format!("{days}d ago");
    }
    then.format("%Y-%m-%d").to_string()
}
