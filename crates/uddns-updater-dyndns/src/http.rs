// # Shared HTTP Plumbing
//
// Update URLs carry the account secret in the query string, so transport
// errors are reported without their URL.

use std::time::Duration;
use uddns_core::traits::IpFamily;
use uddns_core::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Response of an update call
pub(crate) struct Reply {
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// `GET {base}/update?{params}`
///
/// Transport failures become `RemoteUpdate` errors for `family`; the status
/// is left for the caller to judge.
pub(crate) async fn get_update(
    client: &reqwest::Client,
    service: &str,
    base_url: &str,
    family: IpFamily,
    params: &[(&str, &str)],
) -> Result<Reply> {
    let response = client
        .get(format!("{}/update", base_url))
        .query(params)
        .send()
        .await
        .map_err(|e| {
            Error::remote_update(
                family,
                format!("[{}] request failed: {}", service, e.without_url()),
            )
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        Error::remote_update(
            family,
            format!("[{}] failed to read response: {}", service, e.without_url()),
        )
    })?;

    Ok(Reply {
        status,
        body: body.trim().to_string(),
    })
}
