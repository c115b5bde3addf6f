use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::assessment::Assessment;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the separately hosted model server.
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    pub weekly_program: String,
    pub generated_at: Option<String>,
    pub model_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub is_fine_tuned: Option<bool>,
    pub device: Option<String>,
    pub model_type: Option<String>,
    pub error: Option<String>,
}

/// Result of a `/generate` call that reached the server.
#[derive(Debug)]
pub enum GenerationOutcome {
    Generated(Generation),
    Rejected { status: u16, body: String },
}

impl ModelClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        ModelClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `true` only on a 200 from `/health`.
    pub async fn health(&self) -> bool {
        match self
            .http
            .get(self.url("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                warn!("Model server health check failed: {}", e);
                false
            }
        }
    }

    pub async fn model_status(&self) -> Result<ModelStatus> {
        let resp = self
            .http
            .get(self.url("model-status"))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        let status = resp.status();
        let body = resp.text().await?;
        parse_status(&body).with_context(|| format!("Unexpected model-status response ({})", status))
    }

    pub async fn generate(&self, assessment: &Assessment) -> Result<GenerationOutcome> {
        info!(
            goal = %assessment.primary_goal,
            days = assessment.training_days_per_week,
            "Requesting weekly program from {}",
            self.base_url
        );
        let resp = self
            .http
            .post(self.url("generate"))
            .json(assessment)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to reach model server at {}", self.base_url))?;

        let status = resp.status();
        let body = resp.text().await?;
        classify_response(status, body)
    }
}

/// Anything but a 200 is a refusal the caller answers with a placeholder;
/// a 200 without program text is an error.
fn classify_response(status: reqwest::StatusCode, body: String) -> Result<GenerationOutcome> {
    if status != reqwest::StatusCode::OK {
        warn!("Model server returned {}: {}", status, body);
        return Ok(GenerationOutcome::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    let generation = parse_generation(&body)?;
    Ok(GenerationOutcome::Generated(generation))
}

fn parse_generation(body: &str) -> Result<Generation> {
    serde_json::from_str(body).context("Model server response has no weekly_program text")
}

fn parse_status(body: &str) -> Result<ModelStatus> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_joined_without_double_slash() {
        let client = ModelClient::new("http://localhost:3001/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(client.url("/generate"), "http://localhost:3001/generate");
        assert_eq!(client.url("model-status"), "http://localhost:3001/model-status");
    }

    #[test]
    fn generation_body() {
        let g = parse_generation(
            r#"{"weekly_program": "Day 1: rows", "generated_at": "2025-01-01T10:00:00", "model_type": "Base model"}"#,
        )
        .unwrap();
        assert_eq!(g.weekly_program, "Day 1: rows");
        assert_eq!(g.model_type.as_deref(), Some("Base model"));
    }

    #[test]
    fn generation_body_without_text() {
        assert!(parse_generation(r#"{"error": "Model not initialized"}"#).is_err());
    }

    #[test]
    fn status_body() {
        let s = parse_status(r#"{"model_loaded": false, "error": "Generator not initialized"}"#).unwrap();
        assert!(!s.model_loaded);
        assert_eq!(s.error.as_deref(), Some("Generator not initialized"));
        assert!(s.device.is_none());
    }

    #[test]
    fn non_ok_status_is_rejected() {
        let body = r#"{"error": "Weekly program generation failed", "message": "CUDA out of memory"}"#;
        let outcome =
            classify_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, body.to_string()).unwrap();
        match outcome {
            GenerationOutcome::Rejected { status, body: b } => {
                assert_eq!(status, 500);
                assert!(b.contains("CUDA out of memory"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn ok_status_is_generated() {
        let outcome = classify_response(
            reqwest::StatusCode::OK,
            r#"{"weekly_program": "Day 1: rows\nDay 2: dips"}"#.to_string(),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            GenerationOutcome::Generated(ref g) if g.weekly_program.starts_with("Day 1")
        ));
    }

    #[test]
    fn ok_status_without_program_text_is_error() {
        assert!(classify_response(reqwest::StatusCode::OK, "{}".to_string()).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_unhealthy() {
        let client = ModelClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        assert!(!client.health().await);
    }
}
