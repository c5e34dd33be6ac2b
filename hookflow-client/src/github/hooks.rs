//! Webhook endpoints

use async_trait::async_trait;
use hookflow_core::dto::github::Hook;
use reqwest::Method;

use super::GithubClient;
use crate::api::HooksApi;
use crate::error::Result;
use crate::response;

#[async_trait]
impl HooksApi for GithubClient {
    async fn get_hook(&self, owner: &str, repo: &str, id: i64) -> Result<Hook> {
        let path = format!("/repos/{}/{}/hooks/{}", owner, repo, id);
        let response = self.request(Method::GET, &path).send().await?;

        response::json(response).await
    }

    async fn create_hook(&self, owner: &str, repo: &str, hook: &Hook) -> Result<Hook> {
        let path = format!("/repos/{}/{}/hooks", owner, repo);
        let response = self.request(Method::POST, &path).json(hook).send().await?;

        response::json(response).await
    }

    async fn edit_hook(&self, owner: &str, repo: &str, id: i64, hook: &Hook) -> Result<Hook> {
        let path = format!("/repos/{}/{}/hooks/{}", owner, repo, id);
        let response = self.request(Method::PATCH, &path).json(hook).send().await?;

        response::json(response).await
    }

    async fn delete_hook(&self, owner: &str, repo: &str, id: i64) -> Result<()> {
        let path = format!("/repos/{}/{}/hooks/{}", owner, repo, id);
        let response = self.request(Method::DELETE, &path).send().await?;

        response::empty(response).await
    }
}
