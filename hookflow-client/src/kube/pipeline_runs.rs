//! Pipeline-run endpoints

use async_trait::async_trait;
use hookflow_core::domain::pipeline_run::{API_VERSION, PipelineRun};
use reqwest::Method;

use super::KubeClient;
use crate::api::PipelineRunStore;
use crate::error::Result;
use crate::response;

#[async_trait]
impl PipelineRunStore for KubeClient {
    async fn create_pipeline_run(&self, pipeline_run: &PipelineRun) -> Result<PipelineRun> {
        let path = format!(
            "/apis/{}/namespaces/{}/pipelineruns",
            API_VERSION, pipeline_run.metadata.namespace
        );
        let response = self
            .request(Method::POST, &path)
            .json(pipeline_run)
            .send()
            .await?;

        response::json(response).await
    }
}
