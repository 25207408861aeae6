//! Wire types for the generation service.

use serde::{Deserialize, Serialize};

/// Remote statuses that end a generation unsuccessfully.
const FAILURE_STATUSES: &[&str] = &["FAILED", "REJECTED", "CANCELED", "CANCELLED", "TIMED_OUT"];

/// One source item in a create or cost request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
}

/// Body of `POST /generate` and `POST /analyze/cost`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateGeneration {
    pub model: String,
    pub input: Vec<MediaInput>,
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl CreateGeneration {
    pub fn new(
        model: impl Into<String>,
        video_url: impl Into<String>,
        audio_url: impl Into<String>,
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            model: model.into(),
            input: vec![
                MediaInput {
                    kind: "video",
                    url: video_url.into(),
                },
                MediaInput {
                    kind: "audio",
                    url: audio_url.into(),
                },
            ],
            options,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Generation state as reported by `GET /generate/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What one status check means for the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSignal {
    Pending { status: String },
    Succeeded { output_url: String },
    Failed { message: String },
}

impl GenerationMetadata {
    /// An output URL means success regardless of the status string.
    pub fn signal(&self) -> RemoteSignal {
        if let Some(url) = self.output_url.as_deref().filter(|u| !u.is_empty()) {
            return RemoteSignal::Succeeded {
                output_url: url.to_string(),
            };
        }

        let status = self.status.clone().unwrap_or_default();
        if FAILURE_STATUSES.contains(&status.to_ascii_uppercase().as_str()) {
            let message = self
                .error
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| status.clone());
            return RemoteSignal::Failed { message };
        }

        RemoteSignal::Pending { status }
    }
}

/// Result of `POST /analyze/cost`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    #[serde(default)]
    pub estimated_generation_cost: Option<f64>,
    #[serde(default)]
    pub estimated_frame_count: Option<u64>,
}

impl CostEstimate {
    pub fn cost(&self) -> f64 {
        self.estimated_generation_cost.unwrap_or(0.0)
    }
}

/// `POST /analyze/cost` answers with a list of estimates or a single one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CostResponse {
    Many(Vec<CostEstimate>),
    One(CostEstimate),
}

impl CostResponse {
    pub(crate) fn into_estimates(self) -> Vec<CostEstimate> {
        match self {
            Self::Many(estimates) => estimates,
            Self::One(estimate) => vec![estimate],
        }
    }
}
