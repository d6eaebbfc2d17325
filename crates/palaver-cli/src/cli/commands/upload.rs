//! Document upload handler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use palaver_core::api::upload::{validate_files, CandidateFile, UploadClient};
use palaver_core::config::Config;
use palaver_core::store::{SessionPatch, SessionStore};

pub async fn run(
    store: &Arc<SessionStore>,
    config: &Config,
    files: &[PathBuf],
    session: Option<&str>,
) -> Result<()> {
    let session_id = match session {
        Some(id) => {
            store
                .session(id)
                .with_context(|| format!("unknown session '{id}'"))?;
            id.to_string()
        }
        None => store.active_id(),
    };
    let session = store.session(&session_id).context("session disappeared")?;

    let mut candidates = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("bad file name: {}", path.display()))?
            .to_string();
        let bytes =
            std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        candidates.push(CandidateFile { name, bytes });
    }

    let outcome = validate_files(candidates, session.files.len());
    for rejected in &outcome.rejected {
        eprintln!("{}: {}", rejected.name, rejected.reason.message());
    }
    if outcome.accepted.is_empty() {
        bail!("no files accepted for upload");
    }

    let client = UploadClient::new(config.backend_base_url()?);
    let result = client
        .upload(outcome.accepted, session.namespace_id.as_deref())
        .await
        .context("upload documents")?;

    // The session is patched only after a successful upload.
    let mut refs = session.files;
    refs.extend(result.documents.into_iter().map(Into::into));
    let count = refs.len();
    store.update_session(
        &session_id,
        SessionPatch {
            has_document: Some(true),
            namespace_id: Some(result.namespace_id.clone()),
            files: Some(refs),
            ..SessionPatch::default()
        },
    );

    println!(
        "Session {session_id} now holds {count} document(s) in namespace {}",
        result.namespace_id
    );
    Ok(())
}
