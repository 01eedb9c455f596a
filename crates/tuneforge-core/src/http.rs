//! JSON-over-HTTP plumbing shared by the collaborator clients.

use crate::error::{ForgeError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POSTs `body` and decodes the JSON reply. Every failure, including a
/// non-success status or an undecodable body, is a transport failure of
/// `collaborator`.
pub(crate) async fn post_json<B, R>(
    http: &reqwest::Client,
    url: &str,
    collaborator: &str,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized + Sync,
    R: DeserializeOwned,
{
    debug!(collaborator, url, "sending request");

    let response = http
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| ForgeError::transport(collaborator, e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ForgeError::transport(collaborator, format!("HTTP {status}: {text}")));
    }

    response.json::<R>().await.map_err(|e| ForgeError::transport(collaborator, format!("invalid response: {e}")))
}
