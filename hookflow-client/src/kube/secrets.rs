//! Secret endpoints

use async_trait::async_trait;
use hookflow_core::domain::Secret;
use reqwest::Method;

use super::KubeClient;
use crate::api::SecretStore;
use crate::error::Result;
use crate::response;

#[async_trait]
impl SecretStore for KubeClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let path = format!("/api/v1/namespaces/{}/secrets/{}", namespace, name);
        let response = self.request(Method::GET, &path).send().await?;

        response::json(response).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let path = format!("/api/v1/namespaces/{}/secrets", secret.metadata.namespace);
        let response = self.request(Method::POST, &path).json(secret).send().await?;

        response::json(response).await
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret> {
        let path = format!(
            "/api/v1/namespaces/{}/secrets/{}",
            secret.metadata.namespace, secret.metadata.name
        );
        let response = self.request(Method::PUT, &path).json(secret).send().await?;

        response::json(response).await
    }
}
