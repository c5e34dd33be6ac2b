//! Repository endpoints

use async_trait::async_trait;
use hookflow_core::dto::github::RemoteRepository;
use reqwest::Method;

use super::GithubClient;
use crate::api::RepositoriesApi;
use crate::error::Result;
use crate::response;

#[async_trait]
impl RepositoriesApi for GithubClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RemoteRepository> {
        let path = format!("/repos/{}/{}", owner, repo);
        let response = self.request(Method::GET, &path).send().await?;

        response::json(response).await
    }
}
