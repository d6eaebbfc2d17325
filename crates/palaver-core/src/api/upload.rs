//! Document upload client and pre-flight validation.
//!
//! Validation runs entirely client-side before any network call: wrong
//! file types, oversized files and quota overruns are rejected per file,
//! and the valid remainder is still uploaded (partial acceptance).

use std::path::Path;

use serde::Deserialize;

use crate::api::{classify_reqwest_error, ApiError, ApiResult};

const UPLOAD_PATH: &str = "/api/documents";

/// File types accepted for retrieval-augmented sessions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "docx"];

/// Per-file size cap. The reverse proxy caps request bodies at 10MB, so
/// anything larger is guaranteed to fail server-side.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of documents attached to one workspace session.
pub const MAX_FILES_PER_SESSION: usize = 5;

/// A file offered for upload (name plus raw bytes).
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Why a candidate file was rejected before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnsupportedType,
    TooLarge,
    QuotaExceeded,
}

impl RejectReason {
    /// User-facing notification text.
    pub fn message(&self) -> String {
        match self {
            RejectReason::UnsupportedType => format!(
                "Unsupported file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ),
            RejectReason::TooLarge => {
                format!("File exceeds the {}MB limit", MAX_FILE_BYTES / (1024 * 1024))
            }
            RejectReason::QuotaExceeded => format!(
                "A session can hold at most {MAX_FILES_PER_SESSION} documents"
            ),
        }
    }
}

/// A rejected candidate with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectReason,
}

/// Outcome of pre-flight validation.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<CandidateFile>,
    pub rejected: Vec<RejectedFile>,
}

/// Validates candidate files against type, size and quota rules.
///
/// `existing_count` is the number of documents already attached to the
/// session; acceptance is truncated so the total never exceeds
/// `MAX_FILES_PER_SESSION`. Order of accepted files follows input order.
pub fn validate_files(files: Vec<CandidateFile>, existing_count: usize) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let mut slots = MAX_FILES_PER_SESSION.saturating_sub(existing_count);

    for file in files {
        if !has_allowed_extension(&file.name) {
            outcome.rejected.push(RejectedFile {
                name: file.name,
                reason: RejectReason::UnsupportedType,
            });
            continue;
        }
        if file.bytes.len() as u64 > MAX_FILE_BYTES {
            outcome.rejected.push(RejectedFile {
                name: file.name,
                reason: RejectReason::TooLarge,
            });
            continue;
        }
        if slots == 0 {
            outcome.rejected.push(RejectedFile {
                name: file.name,
                reason: RejectReason::QuotaExceeded,
            });
            continue;
        }
        slots -= 1;
        outcome.accepted.push(file);
    }

    outcome
}

fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        })
}

/// One uploaded document as returned by the backend, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub name: String,
    pub document_id: String,
    pub url: String,
}

/// Result of a successful upload call.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub namespace_id: String,
    pub documents: Vec<UploadedDocument>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    namespace_id: String,
    document_responses: Vec<DocumentResponse>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    document: DocumentBody,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    document_id: String,
    document_url: String,
}

/// Client for the document upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    http: reqwest::Client,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Uploads already-validated files, optionally into an existing namespace.
    ///
    /// The backend returns document responses in input order; the result
    /// pairs them back with the input file names. No state is committed by
    /// this call; the caller patches the session only on success.
    pub async fn upload(
        &self,
        files: Vec<CandidateFile>,
        namespace_id: Option<&str>,
    ) -> ApiResult<UploadResult> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();

        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name.clone());
            form = form.part("files", part);
        }
        if let Some(ns) = namespace_id {
            form = form.text("namespace_id", ns.to_string());
        }

        let url = format!("{}{}", self.base_url, UPLOAD_PATH);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::parse(format!("Failed to parse upload response: {e}")))?;

        if parsed.document_responses.len() != names.len() {
            return Err(ApiError::parse(format!(
                "Upload response listed {} documents for {} files",
                parsed.document_responses.len(),
                names.len()
            )));
        }

        let documents = names
            .into_iter()
            .zip(parsed.document_responses)
            .map(|(name, doc)| UploadedDocument {
                name,
                document_id: doc.document.document_id,
                url: doc.document.document_url,
            })
            .collect();

        Ok(UploadResult {
            namespace_id: parsed.namespace_id,
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, size: usize) -> CandidateFile {
        CandidateFile {
            name: name.to_string(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let outcome = validate_files(vec![candidate("malware.exe", 10)], 0);
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected[0].reason, RejectReason::UnsupportedType);
    }

    #[test]
    fn test_rejects_oversized_file() {
        let outcome = validate_files(
            vec![candidate("big.pdf", (MAX_FILE_BYTES + 1) as usize)],
            0,
        );
        assert_eq!(outcome.rejected[0].reason, RejectReason::TooLarge);
    }

    #[test]
    fn test_quota_truncates_partial_acceptance() {
        // 2 already attached, cap of 5: the 4th new valid file overflows.
        let files = vec![
            candidate("a.pdf", 1),
            candidate("b.txt", 1),
            candidate("c.md", 1),
            candidate("d.pdf", 1),
        ];
        let outcome = validate_files(files, 2);

        let accepted: Vec<_> = outcome.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(accepted, vec!["a.pdf", "b.txt", "c.md"]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].name, "d.pdf");
        assert_eq!(outcome.rejected[0].reason, RejectReason::QuotaExceeded);
    }

    #[test]
    fn test_invalid_files_do_not_consume_quota() {
        let files = vec![
            candidate("a.exe", 1),
            candidate("b.pdf", 1),
        ];
        let outcome = validate_files(files, 4);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].name, "b.pdf");
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let outcome = validate_files(vec![candidate("Notes.PDF", 1)], 0);
        assert_eq!(outcome.accepted.len(), 1);
    }
}
