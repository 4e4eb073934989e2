//! Blocking HTTP implementation of the tusker network contract.
//!
//! One request at a time, straight from the send engine's loop; the
//! engine owns ordering and retries, this crate only turns each operation
//! into an HTTP call and classifies what came back.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::multipart::Form;

use tusker_core::net::{Attachment, NetResponse, Network, StatusParams};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for API requests.
pub const USER_AGENT: &str = concat!("tusker/", env!("CARGO_PKG_VERSION"));

/// A blocking HTTP client speaking the Mastodon API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build the HTTP client")?;
        Ok(Self { client })
    }

    fn finish(result: reqwest::Result<reqwest::blocking::Response>) -> NetResponse {
        let response = match result {
            Ok(response) => response,
            Err(err) => return transport_failure(err),
        };
        let status = response.status();
        let (ok, retryable) = classify(status);
        let message = response.text().unwrap_or_default();
        NetResponse {
            ok,
            retryable,
            status_code: status.as_u16(),
            message,
        }
    }
}

impl Network for HttpClient {
    fn post(&mut self, url: &str, access_token: &str) -> NetResponse {
        Self::finish(self.client.post(url).bearer_auth(access_token).send())
    }

    fn delete(&mut self, url: &str, access_token: &str) -> NetResponse {
        Self::finish(self.client.delete(url).bearer_auth(access_token).send())
    }

    fn new_status(
        &mut self,
        url: &str,
        access_token: &str,
        params: StatusParams,
    ) -> NetResponse {
        let form = status_form(&params);
        Self::finish(
            self.client
                .post(url)
                .bearer_auth(access_token)
                .form(&form)
                .send(),
        )
    }

    fn upload(&mut self, url: &str, access_token: &str, attachment: Attachment) -> NetResponse {
        let form = match Form::new().file("file", &attachment.file) {
            Ok(form) => form,
            Err(err) => {
                // Nothing left the machine; a rebuilt form will not fare
                // better, so this is terminal.
                return NetResponse {
                    ok: false,
                    retryable: false,
                    status_code: 0,
                    message: format!(
                        "could not read attachment {}: {err}",
                        attachment.file.display()
                    ),
                };
            }
        };
        let form = if attachment.description.is_empty() {
            form
        } else {
            form.text("description", attachment.description)
        };
        Self::finish(
            self.client
                .post(url)
                .bearer_auth(access_token)
                .multipart(form)
                .send(),
        )
    }
}

/// Map an HTTP status onto the engine's (ok, retryable) pair.
///
/// Timeouts, rate limiting, and server-side errors are worth another
/// attempt; everything else that is not success is terminal.
fn classify(status: StatusCode) -> (bool, bool) {
    let ok = status.is_success();
    let retryable = matches!(status.as_u16(), 408 | 429) || status.is_server_error();
    (ok, retryable)
}

fn transport_failure(err: reqwest::Error) -> NetResponse {
    NetResponse {
        ok: false,
        retryable: true,
        status_code: 0,
        message: err.to_string(),
    }
}

/// Form fields for a status creation; empty optional fields are omitted.
fn status_form(params: &StatusParams) -> Vec<(&'static str, String)> {
    let mut form = vec![("status", params.body.clone())];
    if !params.content_warning.is_empty() {
        form.push(("spoiler_text", params.content_warning.clone()));
    }
    if !params.visibility.is_empty() {
        form.push(("visibility", params.visibility.clone()));
    }
    if !params.in_reply_to_id.is_empty() {
        form.push(("in_reply_to_id", params.in_reply_to_id.clone()));
    }
    for id in &params.attachment_ids {
        form.push(("media_ids[]", id.clone()));
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_are_ok() {
        assert_eq!(classify(StatusCode::OK), (true, false));
        assert_eq!(classify(StatusCode::CREATED), (true, false));
    }

    #[test]
    fn server_trouble_is_retryable() {
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR), (false, true));
        assert_eq!(classify(StatusCode::BAD_GATEWAY), (false, true));
        assert_eq!(classify(StatusCode::REQUEST_TIMEOUT), (false, true));
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), (false, true));
    }

    #[test]
    fn client_errors_are_terminal() {
        assert_eq!(classify(StatusCode::UNAUTHORIZED), (false, false));
        assert_eq!(classify(StatusCode::NOT_FOUND), (false, false));
        assert_eq!(classify(StatusCode::UNPROCESSABLE_ENTITY), (false, false));
    }

    #[test]
    fn empty_optional_fields_stay_out_of_the_form() {
        let form = status_form(&StatusParams {
            body: "hello".to_string(),
            ..StatusParams::default()
        });
        assert_eq!(form, vec![("status", "hello".to_string())]);
    }

    #[test]
    fn the_form_carries_every_set_field() {
        let form = status_form(&StatusParams {
            body: "hello".to_string(),
            content_warning: "cw".to_string(),
            visibility: "private".to_string(),
            in_reply_to_id: "123".to_string(),
            attachment_ids: vec!["7".to_string(), "8".to_string()],
        });
        assert_eq!(
            form,
            vec![
                ("status", "hello".to_string()),
                ("spoiler_text", "cw".to_string()),
                ("visibility", "private".to_string()),
                ("in_reply_to_id", "123".to_string()),
                ("media_ids[]", "7".to_string()),
                ("media_ids[]", "8".to_string()),
            ]
        );
    }

    #[test]
    fn the_user_agent_carries_the_version() {
        assert!(USER_AGENT.starts_with("tusker/"));
        assert!(USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
