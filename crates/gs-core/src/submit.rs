//! Notebook submission to the grading service.

use crate::credentials::Credential;
use crate::transport::{HttpTransport, TransportError};
use gs_config::RemoteService;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Stamp the assignment and class identifiers into the notebook metadata.
///
/// Returns `None` when the notebook is not a JSON object.
pub fn inject_metadata(mut notebook: Value, remote: &RemoteService) -> Option<Value> {
    let root = notebook.as_object_mut()?;
    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    if !metadata.is_object() {
        *metadata = Value::Object(Default::default());
    }
    let metadata = metadata.as_object_mut()?;
    metadata.insert("assignment_id".into(), Value::String(remote.assignment_id.clone()));
    metadata.insert("class_id".into(), Value::String(remote.class_id.clone()));
    Some(notebook)
}

/// Posts notebooks to `{endpoint}/submit`. One attempt, no retries.
pub struct SubmissionClient {
    transport: Arc<dyn HttpTransport>,
}

impl SubmissionClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        SubmissionClient { transport }
    }

    /// Submit `notebook` and return the raw response body.
    pub fn submit(
        &self,
        remote: &RemoteService,
        credential: &Credential,
        notebook: &Value,
    ) -> Result<String, TransportError> {
        let url = remote.submit_url();
        let body = json!({
            "api_key": credential.expose(),
            "nb": notebook,
        });

        info!(url = %url, fingerprint = %credential.fingerprint(), "Submitting notebook");
        self.transport.post_json(&url, &body)
    }
}
