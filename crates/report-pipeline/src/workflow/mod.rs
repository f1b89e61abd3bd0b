//! Workflow orchestrator trigger
//!
//! Submission is fire-and-forget: a run is recorded as `Submitted` and its
//! completion is never observed here.

pub mod airflow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

pub use airflow::AirflowTrigger;

/// Lifecycle of a submitted job, as far as this service knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Submitted,
}

/// An orchestrator job instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Opaque identifier assigned by the orchestrator
    pub run_id: String,
    pub job: String,
    pub params: BTreeMap<String, String>,
    pub state: RunState,
    pub submitted_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn submitted(run_id: String, job: &str, params: &BTreeMap<String, String>) -> Self {
        Self {
            run_id,
            job: job.to_string(),
            params: params.clone(),
            state: RunState::Submitted,
            submitted_at: Utc::now(),
        }
    }
}

/// Submits named jobs to an external orchestrator
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Submit `job` with `params` and return the recorded run
    async fn trigger(&self, job: &str, params: &BTreeMap<String, String>) -> Result<PipelineRun>;

    /// Job that converts a raw PDF with the layout parser
    fn conversion_job(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
