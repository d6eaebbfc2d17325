//! The session store: session lifecycle, streaming response assembly,
//! cancellation and auto-title generation.
//!
//! The store is an explicit, injectable value (`Arc<SessionStore>`), not a
//! module-level global. Interior state lives behind a mutex that is locked
//! only for synchronous mutation sections, never across an await point;
//! every async continuation re-fetches its session by id before mutating,
//! so a session deleted mid-flight ends the stream instead of producing a
//! stale write.

pub mod events;
pub mod persistence;
pub mod session;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::catalog::{CatalogClient, ModelEntry};
use crate::api::chat::{ChatClient, ChatDelta, OutboundMessage};
use crate::api::ApiError;
use crate::config::{paths, Config};
use crate::prompts::{
    augment_with_chain_of_thought, supports_chain_of_thought, DEFAULT_SYSTEM_PROMPT, TITLE_PROMPT,
};

use events::{EventSender, Notice, StoreEvent};
use session::{FileRef, Message, Role, Session, SessionState};

/// Maximum number of history turns sent with a chat request.
const HISTORY_WINDOW: usize = 8;

/// Construction options for a `SessionStore`.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backend_base_url: String,
    pub catalog_url: String,
    pub default_model: String,
    /// Locally stored custom prompt; takes precedence over caller-supplied
    /// prompts in session patches.
    pub custom_prompt: Option<String>,
    /// Where to persist the session list. None keeps the store in memory.
    pub state_path: Option<PathBuf>,
}

impl StoreOptions {
    /// Builds options from loaded configuration, using the default state path.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            backend_base_url: config.backend_base_url()?,
            catalog_url: config.catalog_url()?,
            default_model: config.default_model.clone(),
            custom_prompt: config.system_prompt.clone(),
            state_path: Some(paths::state_path()),
        })
    }
}

/// Partial update for session configuration fields.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub chain_of_thought: Option<bool>,
    pub has_document: Option<bool>,
    pub namespace_id: Option<String>,
    pub files: Option<Vec<FileRef>>,
}

/// Field-level patch for one message.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub is_edit: Option<bool>,
    pub content: Option<String>,
    pub model: Option<String>,
}

/// Mutable interior of the store.
struct StoreState {
    sessions: Vec<Session>,
    active_id: String,
    /// In-flight cancellation handles, keyed by session id. Live-only;
    /// title-generation streams are deliberately not tracked here.
    cancel_handles: HashMap<String, CancellationToken>,
    /// Model catalog snapshot. Not persisted; refetched on rehydration.
    models: Vec<ModelEntry>,
}

impl StoreState {
    fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

/// Owns the session list, the active pointer, per-session streaming state
/// and all mutation operations.
pub struct SessionStore {
    state: Mutex<StoreState>,
    chat: ChatClient,
    catalog: CatalogClient,
    default_model: String,
    custom_prompt: Option<String>,
    state_path: Option<PathBuf>,
}

impl SessionStore {
    /// Creates a store, restoring the session list from disk when a state
    /// path is configured and the file exists. A restored session always
    /// comes back idle; an empty or unreadable state file yields one fresh
    /// default session.
    pub fn new(options: StoreOptions) -> Self {
        let restored = options.state_path.as_deref().and_then(|path| {
            persistence::load_state(path).unwrap_or_else(|err| {
                tracing::warn!("Failed to restore session state: {err:#}");
                None
            })
        });

        let (sessions, active_id) = match restored {
            Some(state) if !state.sessions.is_empty() => {
                let active_id = if state.sessions.iter().any(|s| s.id == state.active_id) {
                    state.active_id
                } else {
                    state.sessions[0].id.clone()
                };
                (state.sessions, active_id)
            }
            _ => {
                let session = Session::new(
                    &options.default_model,
                    options.custom_prompt.clone().unwrap_or_default(),
                );
                let id = session.id.clone();
                (vec![session], id)
            }
        };

        Self {
            state: Mutex::new(StoreState {
                sessions,
                active_id,
                cancel_handles: HashMap::new(),
                models: Vec::new(),
            }),
            chat: ChatClient::new(options.backend_base_url),
            catalog: CatalogClient::new(options.catalog_url),
            default_model: options.default_model,
            custom_prompt: options.custom_prompt,
            state_path: options.state_path,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort persistence of the session list and active pointer.
    fn persist(&self) {
        let Some(path) = self.state_path.as_deref() else {
            return;
        };
        let snapshot = {
            let state = self.state();
            persistence::PersistedState {
                sessions: state.sessions.clone(),
                active_id: state.active_id.clone(),
            }
        };
        if let Err(err) = persistence::save_state(path, &snapshot) {
            tracing::warn!("Failed to persist session state: {err:#}");
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Returns a snapshot of all sessions.
    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    /// Returns a snapshot of one session by id.
    pub fn session(&self, id: &str) -> Option<Session> {
        self.state().session(id).cloned()
    }

    /// Returns the active session id.
    pub fn active_id(&self) -> String {
        self.state().active_id.clone()
    }

    /// Returns a snapshot of the active session.
    pub fn active_session(&self) -> Option<Session> {
        let state = self.state();
        let id = state.active_id.clone();
        state.session(&id).cloned()
    }

    /// Returns the current model catalog snapshot.
    pub fn models(&self) -> Vec<ModelEntry> {
        self.state().models.clone()
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Creates a fresh default session, makes it active, and returns its id.
    pub fn add_session(&self) -> String {
        let session = self.default_session();
        let id = session.id.clone();
        {
            let mut state = self.state();
            state.sessions.push(session);
            state.active_id = id.clone();
        }
        self.persist();
        id
    }

    /// Makes the given session active. No-op if the id is unknown.
    pub fn set_active(&self, id: &str) {
        {
            let mut state = self.state();
            if state.session(id).is_none() {
                return;
            }
            state.active_id = id.to_string();
        }
        self.persist();
    }

    /// Removes a session, keeping the floor-of-one invariant.
    ///
    /// If zero or one session would remain, the list collapses to a single
    /// fresh default session. If the deleted session was active, the most
    /// recently updated survivor becomes active.
    pub fn delete_session(&self, id: &str) {
        {
            let mut state = self.state();
            let before = state.sessions.len();
            state.sessions.retain(|s| s.id != id);
            if state.sessions.len() == before {
                return;
            }
            state.cancel_handles.remove(id);

            if state.sessions.len() <= 1 {
                let fresh = self.default_session();
                state.active_id = fresh.id.clone();
                state.sessions = vec![fresh];
            } else if state.active_id == id {
                if let Some(latest) = state.sessions.iter().max_by_key(|s| s.updated_at) {
                    state.active_id = latest.id.clone();
                }
            }
        }
        self.persist();
    }

    /// Applies a partial update to session configuration.
    ///
    /// The locally stored custom prompt, when present, wins over a
    /// caller-supplied prompt. Enabling chain-of-thought appends the
    /// structured-reasoning block to the effective prompt; the append is
    /// idempotent, so repeated patches never duplicate the block.
    pub fn update_session(&self, id: &str, patch: SessionPatch) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(id) else {
                return;
            };

            if let Some(title) = patch.title {
                session.title = title;
            }
            if let Some(model) = patch.model {
                session.model = model;
            }
            match (&self.custom_prompt, patch.system_prompt) {
                (Some(custom), _) => session.system_prompt = custom.clone(),
                (None, Some(prompt)) => session.system_prompt = prompt,
                (None, None) => {}
            }
            if let Some(cot) = patch.chain_of_thought {
                // Only allow-listed models run with the reasoning block.
                session.chain_of_thought = cot && supports_chain_of_thought(&session.model);
            }
            // Any patch may have rewritten the prompt above; re-append the
            // reasoning block (idempotent) so the flag and the effective
            // prompt never drift apart.
            if session.chain_of_thought {
                session.system_prompt = augment_with_chain_of_thought(&session.system_prompt);
            }
            if let Some(has_document) = patch.has_document {
                session.has_document = has_document;
            }
            if let Some(namespace_id) = patch.namespace_id {
                session.namespace_id = Some(namespace_id);
            }
            if let Some(files) = patch.files {
                session.files = files;
            }
            session.touch();
        }
        self.persist();
    }

    fn default_session(&self) -> Session {
        Session::new(
            &self.default_model,
            self.custom_prompt.clone().unwrap_or_default(),
        )
    }

    // ------------------------------------------------------------------
    // Message mutations
    // ------------------------------------------------------------------

    /// Appends a message to a session. No-op if the session is unknown.
    pub fn add_message(&self, session_id: &str, message: Message) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(session_id) else {
                return;
            };
            session.messages.push(message);
            session.touch();
        }
        self.persist();
    }

    /// Replaces a session's message list with an empty one.
    pub fn clear_messages(&self, session_id: &str) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(session_id) else {
                return;
            };
            session.messages.clear();
            session.touch();
        }
        self.persist();
    }

    /// Applies a field-level patch to one message by id.
    pub fn update_message(&self, session_id: &str, message_id: &str, patch: MessagePatch) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(session_id) else {
                return;
            };
            let Some(message) = session.messages.iter_mut().find(|m| m.id == message_id) else {
                return;
            };
            if let Some(is_edit) = patch.is_edit {
                message.is_edit = is_edit;
            }
            if let Some(content) = patch.content {
                message.content = content;
            }
            if let Some(model) = patch.model {
                message.model = model;
            }
            message.touch();
            session.touch();
        }
        self.persist();
    }

    /// Truncates a session's messages at the target message.
    ///
    /// A user target is kept (everything after it drops, so the caller can
    /// resend); an assistant target drops along with everything after it.
    /// No-op if the message is not found.
    pub fn regenerate_chat(&self, session_id: &str, message_id: &str) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(session_id) else {
                return;
            };
            let Some(index) = session.messages.iter().position(|m| m.id == message_id) else {
                return;
            };
            let keep = match session.messages[index].role {
                Role::User => index + 1,
                Role::Assistant | Role::System => index,
            };
            session.messages.truncate(keep);
            session.touch();
        }
        self.persist();
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    /// Opens a chat stream for the session and assembles the assistant
    /// response from content deltas.
    ///
    /// No-op if the session is unknown or already Connecting/Responding
    /// (at most one concurrent stream per session). All failures resolve
    /// here: the session returns to Idle and the caller is notified
    /// through `events`; nothing is propagated.
    pub async fn send_chat(self: &Arc<Self>, session_id: &str, model_id: &str, events: &EventSender) {
        let Some((outbound, token)) = self.begin_stream(session_id) else {
            return;
        };
        self.persist();

        // Cancellation must cover the open handshake as well as the
        // streaming phase.
        let opened = tokio::select! {
            () = token.cancelled() => None,
            result = self.chat.stream_chat(&outbound, model_id) => Some(result),
        };

        let mut stream = match opened {
            None => {
                self.finish_stream(session_id);
                events
                    .send_important(StoreEvent::StreamClosed {
                        session_id: session_id.to_string(),
                    })
                    .await;
                return;
            }
            Some(Err(err)) => {
                self.finish_stream(session_id);
                events
                    .send_important(StoreEvent::Notice(notice_for(&err)))
                    .await;
                events
                    .send_important(StoreEvent::StreamClosed {
                        session_id: session_id.to_string(),
                    })
                    .await;
                return;
            }
            Some(Ok(stream)) => stream,
        };

        let mut saw_done = false;
        loop {
            let item = tokio::select! {
                () = token.cancelled() => break,
                item = stream.next() => item,
            };
            let Some(item) = item else { break };

            match item {
                Ok(delta) => {
                    // One best-effort notification per parsed event, whether
                    // or not it carries content.
                    events.send_delta(StoreEvent::Delta {
                        session_id: session_id.to_string(),
                    });
                    match delta {
                        ChatDelta::Content(text) => {
                            if !self.apply_delta(session_id, &text, model_id) {
                                // Session vanished mid-flight; stop quietly.
                                break;
                            }
                        }
                        ChatDelta::Done => saw_done = true,
                        // Best-effort protocol: unusable deltas are skipped.
                        ChatDelta::Malformed => {}
                    }
                }
                Err(err) => {
                    tracing::debug!("Chat stream error: {err}");
                    events
                        .send_important(StoreEvent::Notice(Notice::RequestFailed {
                            message: err.message.clone(),
                        }))
                        .await;
                    break;
                }
            }
        }

        self.finish_stream(session_id);
        self.persist();
        events
            .send_important(StoreEvent::StreamClosed {
                session_id: session_id.to_string(),
            })
            .await;

        if saw_done && self.needs_title(session_id) {
            let store = Arc::clone(self);
            let id = session_id.to_string();
            tokio::spawn(async move {
                store.generate_title(&id).await;
            });
        }
    }

    /// Cancels the in-flight stream for a session, if any, and forces the
    /// session back to Idle. Idempotent: cancelling an idle session is a
    /// safe no-op.
    pub fn cancel_chat(&self, session_id: &str) {
        let mut state = self.state();
        if let Some(token) = state.cancel_handles.remove(session_id) {
            token.cancel();
        }
        if let Some(session) = state.session_mut(session_id) {
            session.state = SessionState::Idle;
            session.touch();
        }
    }

    /// Generates a title for an untitled session over a second, untracked
    /// stream against the chat endpoint. Deltas append directly to the
    /// title field; failures are swallowed.
    pub async fn generate_title(&self, session_id: &str) {
        let context = {
            let state = self.state();
            let Some(session) = state.session(session_id) else {
                return;
            };
            if !session.title.is_empty() || session.messages.is_empty() {
                return;
            }
            build_title_context(session)
        };
        let model_id = {
            let state = self.state();
            match state.session(session_id) {
                Some(session) => session.model.clone(),
                None => return,
            }
        };

        let mut stream = match self.chat.stream_chat(&context, &model_id).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::debug!("Title generation failed to open: {err}");
                return;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(ChatDelta::Content(text)) => {
                    let mut state = self.state();
                    let Some(session) = state.session_mut(session_id) else {
                        return;
                    };
                    session.title.push_str(&text);
                    session.touch();
                }
                Ok(ChatDelta::Done) => break,
                Ok(ChatDelta::Malformed) => {}
                Err(err) => {
                    tracing::debug!("Title stream error: {err}");
                    break;
                }
            }
        }
        self.persist();
    }

    /// Gate + setup for `send_chat`: validates the session is idle, moves
    /// it to Connecting, builds the outbound window and registers the
    /// cancellation handle.
    fn begin_stream(&self, session_id: &str) -> Option<(Vec<OutboundMessage>, CancellationToken)> {
        let mut state = self.state();
        let session = state.session_mut(session_id)?;
        if session.state != SessionState::Idle {
            return None;
        }
        session.state = SessionState::Connecting;
        session.touch();
        let outbound = build_outbound(session);

        let token = CancellationToken::new();
        state
            .cancel_handles
            .insert(session_id.to_string(), token.clone());
        Some((outbound, token))
    }

    /// Applies one content delta, re-fetching the session by id.
    ///
    /// Returns false if the session no longer exists.
    fn apply_delta(&self, session_id: &str, text: &str, model_id: &str) -> bool {
        let mut state = self.state();
        let Some(session) = state.session_mut(session_id) else {
            return false;
        };
        session.state = SessionState::Responding;

        match session.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.push_str(text);
                last.touch();
            }
            _ => {
                session.messages.push(Message::assistant(text, model_id));
            }
        }
        session.touch();
        true
    }

    /// Tears down a stream: drops the cancellation handle and returns the
    /// session to Idle if it still exists.
    fn finish_stream(&self, session_id: &str) {
        let mut state = self.state();
        state.cancel_handles.remove(session_id);
        if let Some(session) = state.session_mut(session_id) {
            session.state = SessionState::Idle;
            session.touch();
        }
    }

    fn needs_title(&self, session_id: &str) -> bool {
        let state = self.state();
        state
            .session(session_id)
            .is_some_and(|s| s.title.is_empty() && !s.messages.is_empty())
    }

    // ------------------------------------------------------------------
    // Model catalog
    // ------------------------------------------------------------------

    /// Fetches the model catalog and replaces the snapshot.
    pub async fn refresh_models(&self) -> Result<(), ApiError> {
        let models = self.catalog.fetch().await?;
        self.state().models = models;
        Ok(())
    }

    #[cfg(test)]
    fn has_cancel_handle(&self, session_id: &str) -> bool {
        self.state().cancel_handles.contains_key(session_id)
    }
}

/// Spawns the periodic catalog revalidation task.
///
/// The first tick fires immediately, covering the initial fetch after
/// store construction. Failures are logged and retried next interval.
pub fn spawn_catalog_refresh(store: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = store.refresh_models().await {
                tracing::warn!("Model catalog refresh failed: {err}");
            }
        }
    })
}

/// Builds the outbound message window for a chat request: system turns
/// are dropped from history, at most the last `HISTORY_WINDOW` turns are
/// kept, and the session's prompt (or the default) is prepended as the
/// system message.
fn build_outbound(session: &Session) -> Vec<OutboundMessage> {
    let prompt = if session.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT.trim()
    } else {
        session.system_prompt.as_str()
    };

    let history: Vec<&Message> = session
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();
    let window = history.len().saturating_sub(HISTORY_WINDOW);

    let mut outbound = Vec::with_capacity(HISTORY_WINDOW + 1);
    outbound.push(OutboundMessage::new("system", prompt));
    for message in &history[window..] {
        outbound.push(OutboundMessage::new(message.role.as_str(), &message.content));
    }
    outbound
}

/// Builds the title-generation context: the last `HISTORY_WINDOW` turns
/// without the system-message substitution, plus the title instruction as
/// a final user turn.
fn build_title_context(session: &Session) -> Vec<OutboundMessage> {
    let history: Vec<&Message> = session
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();
    let window = history.len().saturating_sub(HISTORY_WINDOW);

    let mut outbound: Vec<OutboundMessage> = history[window..]
        .iter()
        .map(|m| OutboundMessage::new(m.role.as_str(), &m.content))
        .collect();
    outbound.push(OutboundMessage::new("user", TITLE_PROMPT.trim()));
    outbound
}

fn notice_for(err: &ApiError) -> Notice {
    if err.is_rate_limited() {
        Notice::RateLimited
    } else {
        Notice::RequestFailed {
            message: err.message.clone(),
        }
    }
}
