use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_codebuild::{Client, error::DisplayErrorContext};
use tracing::debug;

use crate::types::{BuildService, RebuildRequest};

/// AWS CodeBuild build service.
pub struct CodeBuild {
    client: Client,
}

impl CodeBuild {
    /// Loads credentials and region from the standard AWS provider chain.
    /// `region` overrides the chain's region; `timeout` bounds each call.
    /// Retries are disabled.
    pub async fn from_env(region: Option<String>, timeout: Duration) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );

        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }

        Self::new(Client::new(&loader.load().await))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildService for CodeBuild {
    async fn start_build(&self, request: &RebuildRequest) -> Result<String> {
        debug!(project = %request.project, branch = %request.branch, "StartBuild");

        let output = self
            .client
            .start_build()
            .project_name(&request.project)
            .source_version(&request.branch)
            .send()
            .await
            .map_err(|err| {
                anyhow::anyhow!("CodeBuild StartBuild failed: {}", DisplayErrorContext(&err))
            })?;

        Ok(output
            .build_value()
            .and_then(|build| build.id())
            .unwrap_or("unknown")
            .to_string())
    }
}
