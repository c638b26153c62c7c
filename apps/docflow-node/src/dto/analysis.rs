//! DTOs for analysis endpoints

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use docflow_domain::orchestrator::{DocumentOutcome, JobProgress, JobResult};
use docflow_domain::{AnalysisRequest, JobError, Metrics};

/// Request body for the analysis endpoint
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Document references, as paths readable by the processors
    #[schema(example = json!(["docs/news.md", "docs/blog.md"]))]
    pub documents: Vec<String>,
    /// Topics (heading texts) to compute metrics for
    #[schema(example = json!(["Sport"]))]
    pub topics: Vec<String>,
}

impl From<AnalyzeRequest> for AnalysisRequest {
    fn from(request: AnalyzeRequest) -> Self {
        AnalysisRequest::new(request.documents, request.topics)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    #[schema(example = 4)]
    pub line_count: u64,
    #[schema(example = 10)]
    pub word_count: u64,
    #[schema(example = 47)]
    pub char_count: u64,
}

impl From<Metrics> for MetricsResponse {
    fn from(m: Metrics) -> Self {
        Self {
            line_count: m.line_count,
            word_count: m.word_count,
            char_count: m.char_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentOutcomeResponse {
    /// `done` or `failed` (`pending` / `assigned` if the job timed out)
    #[schema(example = "done")]
    pub state: String,
    #[schema(example = 1)]
    pub attempts: u32,
    pub error: Option<String>,
}

impl From<DocumentOutcome> for DocumentOutcomeResponse {
    fn from(outcome: DocumentOutcome) -> Self {
        Self {
            state: snake_case(&outcome.state),
            attempts: outcome.attempts,
            error: outcome.error,
        }
    }
}

/// Response body of a finished analysis
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    #[schema(example = "01928f6e-8c1a-7d3e-9f00-2b1c4d5e6f70")]
    pub job_id: String,
    /// `complete` or `partial`
    #[schema(example = "complete")]
    pub status: String,
    pub metrics: BTreeMap<String, MetricsResponse>,
    pub documents: BTreeMap<String, DocumentOutcomeResponse>,
    /// Requested topics whose aggregator could not be queried
    pub missing_topics: Vec<String>,
}

impl From<JobResult> for AnalyzeResponse {
    fn from(result: JobResult) -> Self {
        Self {
            job_id: result.job_id.to_string(),
            status: snake_case(&result.status),
            metrics: result
                .metrics
                .into_iter()
                .map(|(topic, m)| (topic, m.into()))
                .collect(),
            documents: result
                .documents
                .into_iter()
                .map(|(doc, outcome)| (doc.to_string(), outcome.into()))
                .collect(),
            missing_topics: result.missing_topics,
        }
    }
}

/// Current phase of the orchestrator
#[derive(Debug, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Option<String>,
    #[schema(example = "dispatching")]
    pub phase: String,
}

impl From<JobProgress> for JobStatusResponse {
    fn from(progress: JobProgress) -> Self {
        Self {
            job_id: progress.job_id.map(|id| id.to_string()),
            phase: snake_case(&progress.phase),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind
    #[schema(example = "invalid_request")]
    pub kind: String,
    /// Error description
    #[schema(example = "Invalid request: at least one topic is required")]
    pub error: String,
}

impl From<&JobError> for ErrorResponse {
    fn from(err: &JobError) -> Self {
        Self {
            kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}

/// Wire name of a unit enum variant
fn snake_case<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
