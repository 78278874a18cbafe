use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::infrastructure::error::CoreError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Opaque text completion. The core treats whatever comes back as
/// untrusted and always routes it through the plan parser.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

/// Builds the study-plan prompt sent to the model. Material beyond
/// `char_budget` is cut off; the tail of a long document rarely changes the
/// plan and oversized prompts are rejected by the API anyway.
pub fn build_study_prompt(material: &str, days: u32, hours_per_day: f64, char_budget: usize) -> String {
    let truncated: String = material.chars().take(char_budget).collect();
    format!(
        "You are an AI tutor. Analyze the following study material and create a JSON plan:\n\
         - Extract 5-7 key topics.\n\
         - Estimate study time (hours) per topic, assuming about {hours_per_day} study hours per day.\n\
         - Create a {days}-day study schedule with daily sessions.\n\
         - For each topic, suggest 2-3 resources (official docs, textbooks, tutorials).\n\
         - Return ONLY valid JSON, structured like this:\n\
         {{\n\
           \"title\": \"...\",\n\
           \"topics\": [\n\
             {{\"name\": \"...\", \"summary\": \"...\", \"estimated_hours\": 3, \"resources\": [\"...\", \"...\"]}}\n\
           ],\n\
           \"schedule\": [\n\
             {{\"date\": \"2025-11-01\", \"topic\": \"...\", \"duration_minutes\": 60, \"objective\": \"...\"}}\n\
           ]\n\
         }}\n\
         Study material:\n\
         {truncated}"
    )
}

/// Client for the Google Generative Language `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiPlanGenerator {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiPlanGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn generate_endpoint(&self) -> Result<Url, CoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| CoreError::Generator(format!("invalid api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CoreError::Generator("generator api base URL cannot be a base".to_string())
            })?;
            segments.push("models");
            segments.push(&format!("{}:generateContent", self.model));
        }
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[derive(Debug, serde::Serialize)]
struct GenerateContentRequest {
    contents: Vec<ContentPayload>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ContentPayload {
    parts: Vec<PartPayload>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PartPayload {
    text: String,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<CandidatePayload>>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidatePayload {
    content: Option<ContentPayload>,
}

fn extract_response_text(response: GenerateContentResponse) -> Option<String> {
    let text = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[async_trait]
impl PlanGenerator for GeminiPlanGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        if self.api_key.trim().is_empty() {
            return Err(CoreError::Generator("api key must not be empty".to_string()));
        }

        let endpoint = self.generate_endpoint()?;
        let request = GenerateContentRequest {
            contents: vec![ContentPayload {
                parts: vec![PartPayload {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                CoreError::Generator(format!("network error while generating plan: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Generator(format!("failed reading generator response: {error}"))
        })?;

        if !status.is_success() {
            return Err(CoreError::Generator(format!(
                "generator api error: http {}; body={body}",
                status.as_u16()
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            CoreError::Generator(format!("invalid generator payload: {error}; body={body}"))
        })?;

        extract_response_text(parsed).ok_or_else(|| {
            CoreError::Generator("generator response contained no text".to_string())
        })
    }
}
