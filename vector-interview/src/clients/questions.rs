use serde::Deserialize;
use uuid::Uuid;

use vector_shared::errors::{AppError, AppResult, ErrorCode};

/// Client for the question-pool service. The pool owns question content and
/// selection; this service only stores the returned ids.
#[derive(Clone)]
pub struct QuestionClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSummary {
    pub id: Uuid,
    pub title: String,
    pub difficulty: String,
}

#[derive(Debug, Deserialize)]
struct QuestionEnvelope {
    data: QuestionSummary,
}

impl QuestionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn get_random_question(
        &self,
        interview_type: &str,
        level: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<QuestionSummary> {
        let url = format!("{}/internal/questions/random", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("interview_type", interview_type.to_string()),
            ("level", level.to_string()),
        ];
        if let Some(exclude) = exclude_id {
            query.push(("exclude", exclude.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "question service unreachable");
                AppError::new(ErrorCode::ServiceUnavailable, "question pool is unavailable")
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "question service returned an error");
            return Err(AppError::new(
                ErrorCode::ServiceUnavailable,
                "question pool could not supply a question",
            ));
        }

        let envelope = response.json::<QuestionEnvelope>().await.map_err(|e| {
            tracing::error!(error = %e, "malformed question service response");
            AppError::new(ErrorCode::ServiceUnavailable, "question pool is unavailable")
        })?;

        Ok(envelope.data)
    }
}
