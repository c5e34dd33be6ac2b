//! Workflow endpoints

use async_trait::async_trait;
use hookflow_core::domain::workflow::{API_GROUP, API_VERSION, Workflow, WorkflowList};
use reqwest::Method;

use super::KubeClient;
use crate::api::WorkflowStore;
use crate::error::Result;
use crate::response;

fn workflow_path(namespace: &str, name: &str) -> String {
    format!(
        "/apis/{}/{}/namespaces/{}/workflows/{}",
        API_GROUP, API_VERSION, namespace, name
    )
}

#[async_trait]
impl WorkflowStore for KubeClient {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow> {
        let response = self
            .request(Method::GET, &workflow_path(namespace, name))
            .send()
            .await?;

        response::json(response).await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let path = format!("/apis/{}/{}/workflows", API_GROUP, API_VERSION);
        let response = self.request(Method::GET, &path).send().await?;

        let list: WorkflowList = response::json(response).await?;
        Ok(list.items)
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        let path = workflow_path(workflow.namespace(), workflow.name());
        let response = self.request(Method::PUT, &path).json(workflow).send().await?;

        response::json(response).await
    }

    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow> {
        let path = format!(
            "{}/status",
            workflow_path(workflow.namespace(), workflow.name())
        );
        let response = self.request(Method::PUT, &path).json(workflow).send().await?;

        response::json(response).await
    }
}
