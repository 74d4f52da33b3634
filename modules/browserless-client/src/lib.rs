pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Body for `POST /content`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    best_attempt: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        // Leave headroom over the in-browser navigation timeout so Browserless
        // can report its own error instead of the socket being cut.
        let client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()
            .map_err(|e| BrowserlessError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        match self.token {
            Some(ref token) => format!("{}/content?token={token}", self.base_url),
            None => format!("{}/content", self.base_url),
        }
    }

    /// Fetch fully-rendered HTML for a URL, after client-side scripts have run.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: "networkidle2",
                timeout: self.timeout.as_millis() as u64,
            },
            best_attempt: true,
        };

        debug!(url, "Browserless content request");

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrowserlessError::Timeout(self.timeout.as_secs())
                } else {
                    e.into()
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_token_when_present() {
        let client =
            BrowserlessClient::new("http://chrome:3000/", Some("abc"), Duration::from_secs(10))
                .unwrap();
        assert_eq!(client.endpoint(), "http://chrome:3000/content?token=abc");
    }

    #[test]
    fn empty_token_is_ignored() {
        let client =
            BrowserlessClient::new("http://chrome:3000", Some(""), Duration::from_secs(10)).unwrap();
        assert_eq!(client.endpoint(), "http://chrome:3000/content");
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body = ContentRequest {
            url: "https://example.com/careers",
            goto_options: GotoOptions {
                wait_until: "networkidle2",
                timeout: 30_000,
            },
            best_attempt: true,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["gotoOptions"]["waitUntil"], "networkidle2");
        assert_eq!(value["bestAttempt"], true);
    }
}
