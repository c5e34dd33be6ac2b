//! Deploy key endpoints

use async_trait::async_trait;
use hookflow_core::dto::github::Key;
use reqwest::Method;

use super::GithubClient;
use crate::api::DeployKeysApi;
use crate::error::Result;
use crate::response;

#[async_trait]
impl DeployKeysApi for GithubClient {
    async fn get_key(&self, owner: &str, repo: &str, id: i64) -> Result<Key> {
        let path = format!("/repos/{}/{}/keys/{}", owner, repo, id);
        let response = self.request(Method::GET, &path).send().await?;

        response::json(response).await
    }

    async fn create_key(&self, owner: &str, repo: &str, key: &Key) -> Result<Key> {
        let path = format!("/repos/{}/{}/keys", owner, repo);
        let response = self.request(Method::POST, &path).json(key).send().await?;

        response::json(response).await
    }

    async fn delete_key(&self, owner: &str, repo: &str, id: i64) -> Result<()> {
        let path = format!("/repos/{}/{}/keys/{}", owner, repo, id);
        let response = self.request(Method::DELETE, &path).send().await?;

        response::empty(response).await
    }
}
