//! The network contract the send engine is written against.
//!
//! The engine never talks to a socket itself; it is handed the four
//! operations it needs as a [`Network`] value. Production wires in the
//! blocking HTTP client from `tusker-net`; tests wire in recording mocks
//! that can be told to fail N times or fail for good.

use std::path::PathBuf;

/// Outcome of one network operation.
///
/// `ok` means success; `retryable` distinguishes a transient failure
/// (worth another attempt) from a terminal one.
#[derive(Debug, Clone)]
pub struct NetResponse {
    pub ok: bool,
    pub retryable: bool,
    pub status_code: u16,
    /// Response body, or the transport error text.
    pub message: String,
}

/// Parameters for creating a status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusParams {
    pub body: String,
    pub content_warning: String,
    /// Lower-case visibility name, or empty to let the server decide.
    pub visibility: String,
    pub in_reply_to_id: String,
    pub attachment_ids: Vec<String>,
}

/// One file to upload alongside its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file: PathBuf,
    pub description: String,
}

/// The capability set the send engine is polymorphic over.
pub trait Network {
    fn post(&mut self, url: &str, access_token: &str) -> NetResponse;

    fn delete(&mut self, url: &str, access_token: &str) -> NetResponse;

    fn new_status(&mut self, url: &str, access_token: &str, params: StatusParams)
    -> NetResponse;

    fn upload(&mut self, url: &str, access_token: &str, attachment: Attachment)
    -> NetResponse;
}

/// `https://<instance>/api/v1/statuses/<id>/<action>`
pub fn status_action_url(instance_url: &str, id: &str, action: &str) -> String {
    format!("https://{instance_url}/api/v1/statuses/{id}/{action}")
}

/// Endpoint for creating a status.
pub fn new_status_url(instance_url: &str) -> String {
    format!("https://{instance_url}/api/v1/statuses")
}

/// Endpoint for uploading an attachment.
pub fn media_url(instance_url: &str) -> String {
    format!("https://{instance_url}/api/v1/media")
}
