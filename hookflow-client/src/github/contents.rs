//! File contents endpoint

use async_trait::async_trait;
use reqwest::Method;

use super::GithubClient;
use crate::api::ContentsApi;
use crate::error::Result;
use crate::response;

/// Media type returning the file itself instead of a base64 JSON envelope
const ACCEPT_RAW: &str = "application/vnd.github.raw";

#[async_trait]
impl ContentsApi for GithubClient {
    async fn get_file(&self, owner: &str, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let path = format!(
            "/repos/{}/{}/contents/{}",
            owner,
            repo,
            path.trim_start_matches('/')
        );
        let response = self
            .request_accepting(Method::GET, &path, ACCEPT_RAW)
            .query(&[("ref", git_ref)])
            .send()
            .await?;

        response::bytes(response).await
    }
}
