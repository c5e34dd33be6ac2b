//! Response handling shared by the GitHub and cluster clients

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Check the status code and deserialize the JSON body
pub(crate) async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check(response).await?;

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Check the status code and return the raw body
pub(crate) async fn bytes(response: reqwest::Response) -> Result<Vec<u8>> {
    let response = check(response).await?;
    Ok(response.bytes().await?.to_vec())
}

/// Check the status code of a response that carries no useful body
pub(crate) async fn empty(response: reqwest::Response) -> Result<()> {
    check(response).await.map(|_| ())
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        debug!(status = status.as_u16(), "API request failed: {}", error_text);
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(response)
}
