//! Chat command handler.
//!
//! One-shot when a message is given (or piped in), otherwise a line REPL
//! driving the active session. Ctrl-C cancels the in-flight turn.

use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use palaver_core::store::events::{create_event_channel, EventSender, Notice, StoreEvent};
use palaver_core::store::session::{Message, Role};
use palaver_core::store::{spawn_catalog_refresh, SessionPatch, SessionStore};

#[derive(Debug, Default)]
pub struct ChatRunOptions {
    pub message: Option<String>,
    pub model: Option<String>,
    pub session: Option<String>,
    pub chain_of_thought: bool,
    /// Catalog revalidation interval for the interactive REPL.
    pub catalog_refresh: Duration,
}

pub async fn run(store: &Arc<SessionStore>, opts: ChatRunOptions) -> Result<()> {
    let session_id = match opts.session {
        Some(id) => {
            store
                .session(&id)
                .with_context(|| format!("unknown session '{id}'"))?;
            store.set_active(&id);
            id
        }
        None => store.active_id(),
    };

    if opts.model.is_some() || opts.chain_of_thought {
        store.update_session(
            &session_id,
            SessionPatch {
                model: opts.model,
                chain_of_thought: opts.chain_of_thought.then_some(true),
                ..SessionPatch::default()
            },
        );
    }

    if let Some(message) = opts.message {
        return run_turn(store, &session_id, &message).await;
    }

    // Piped stdin is a one-shot turn as well.
    if !std::io::stdin().is_terminal() {
        let mut buffer = String::new();
        std::io::stdin().lock().read_to_string(&mut buffer)?;
        let trimmed = buffer.trim();
        if trimmed.is_empty() {
            bail!("No input provided via pipe");
        }
        return run_turn(store, &session_id, trimmed).await;
    }

    // Long-lived mode: keep the model catalog fresh in the background.
    let _refresh = (!opts.catalog_refresh.is_zero())
        .then(|| spawn_catalog_refresh(Arc::clone(store), opts.catalog_refresh));

    println!("palaver chat — :q to quit");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":q" {
            println!("Goodbye!");
            break;
        }
        run_turn(store, &session_id, line).await?;
    }
    Ok(())
}

async fn run_turn(store: &Arc<SessionStore>, session_id: &str, text: &str) -> Result<()> {
    let session = store.session(session_id).context("session disappeared")?;
    let model = session.model;
    tracing::debug!("sending chat turn on session {session_id} with model {model}");

    store.add_message(session_id, Message::user(text, &model));

    let (tx, mut rx) = create_event_channel();
    let events = EventSender::new(tx);

    // Follows the growing assistant message and prints each new suffix.
    let printer = {
        let store = Arc::clone(store);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let mut printed = 0usize;
            let mut stdout = std::io::stdout();
            while let Some(event) = rx.recv().await {
                match event {
                    StoreEvent::Delta { .. } => {
                        let Some(session) = store.session(&session_id) else {
                            continue;
                        };
                        if let Some(last) = session.messages.last() {
                            if last.role == Role::Assistant && last.content.len() > printed {
                                let _ = write!(stdout, "{}", &last.content[printed..]);
                                let _ = stdout.flush();
                                printed = last.content.len();
                            }
                        }
                    }
                    StoreEvent::Notice(Notice::RateLimited) => {
                        eprintln!("Rate limited, slow down");
                    }
                    StoreEvent::Notice(Notice::RequestFailed { message }) => {
                        eprintln!("Request failed: {message}");
                    }
                    StoreEvent::StreamClosed { .. } => break,
                }
            }
            printed
        })
    };

    tokio::select! {
        () = store.send_chat(session_id, &model, &events) => {}
        _ = tokio::signal::ctrl_c() => {
            store.cancel_chat(session_id);
            eprintln!("Cancelled.");
        }
    }

    drop(events);
    let printed = printer.await.unwrap_or(0);
    if printed > 0 {
        println!();
    }
    Ok(())
}
