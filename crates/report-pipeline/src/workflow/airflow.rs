//! Airflow stable REST API trigger

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{PipelineRun, WorkflowTrigger};
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "Airflow";

#[derive(Serialize)]
struct DagRunRequest<'a> {
    conf: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct DagRunResponse {
    dag_run_id: String,
}

/// Triggers DAG runs with HTTP basic auth
pub struct AirflowTrigger {
    client: Client,
    config: WorkflowConfig,
}

impl AirflowTrigger {
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn dag_runs_url(&self, job: &str) -> String {
        format!(
            "{}/dags/{}/dagRuns",
            self.config.base_url.trim_end_matches('/'),
            job
        )
    }
}

#[async_trait]
impl WorkflowTrigger for AirflowTrigger {
    async fn trigger(&self, job: &str, params: &BTreeMap<String, String>) -> Result<PipelineRun> {
        let url = self.dag_runs_url(job);
        tracing::info!("Triggering {} with {:?}", job, params);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&DagRunRequest { conf: params })
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("trigger request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Triggering {} failed: HTTP {}", job, status);
            return Err(Error::upstream(
                SERVICE,
                format!("Failed to trigger DAG: HTTP {} - {}", status, body),
            ));
        }

        let run: DagRunResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("invalid dagRuns response: {}", e)))?;

        tracing::info!("Submitted {} run {}", job, run.dag_run_id);
        Ok(PipelineRun::submitted(run.dag_run_id, job, params))
    }

    fn conversion_job(&self) -> &str {
        &self.config.dag_id
    }

    fn name(&self) -> &str {
        "airflow"
    }
}
