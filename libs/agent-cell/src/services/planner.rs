// libs/agent-cell/src/services/planner.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::{Turn, TurnRole};

const PLAN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

/// What the model wants next: one or more tool calls, or the final reply.
#[derive(Debug, Clone)]
pub enum PlannerDecision {
    ToolCalls(Vec<ToolCall>),
    Reply(String),
}

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Planner not configured")]
    NotConfigured,

    #[error("Planner request failed: {0}")]
    Transport(String),

    #[error("Planner returned an unusable response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PlannerError {
    fn from(e: reqwest::Error) -> Self {
        PlannerError::Transport(e.to_string())
    }
}

/// Produces the next action for a conversation. The orchestrator owns the
/// loop; a planner only ever sees one step.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        system: &str,
        turns: &[Turn],
        declarations: &[Value],
    ) -> Result<PlannerDecision, PlannerError>;
}

/// Gemini generateContent client. Tool observations travel as user-role
/// text parts; the model's function calls come back as functionCall parts.
pub struct GeminiPlanner {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiPlanner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(PLAN_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn contents(turns: &[Turn]) -> Vec<Value> {
        turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    TurnRole::Assistant => "model",
                    TurnRole::User | TurnRole::Tool => "user",
                };
                json!({
                    "role": role,
                    "parts": [{"text": t.content}],
                })
            })
            .collect()
    }

    fn decode(body: Value) -> Result<PlannerDecision, PlannerError> {
        let parts = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.pointer("/content/parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| PlannerError::Decode("no candidates in response".to_string()))?;

        let mut calls = Vec::new();
        let mut text = String::new();

        for part in parts {
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PlannerError::Decode("functionCall without name".to_string()))?;
                calls.push(ToolCall {
                    name: name.to_string(),
                    args: call.get("args").cloned().unwrap_or_else(|| json!({})),
                });
            } else if let Some(t) = part.get("text").and_then(Value::as_str) {
                if !t.trim().is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(t.trim());
                }
            }
        }

        if !calls.is_empty() {
            Ok(PlannerDecision::ToolCalls(calls))
        } else if !text.is_empty() {
            Ok(PlannerDecision::Reply(text))
        } else {
            Ok(PlannerDecision::Reply(
                "Agent did not return a text reply.".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Planner for GeminiPlanner {
    async fn plan(
        &self,
        system: &str,
        turns: &[Turn],
        declarations: &[Value],
    ) -> Result<PlannerDecision, PlannerError> {
        if !self.is_configured() {
            return Err(PlannerError::NotConfigured);
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut payload = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": Self::contents(turns),
        });
        if !declarations.is_empty() {
            payload["tools"] = json!([{"functionDeclarations": declarations}]);
        }

        debug!("Requesting plan from {} over {} turns", self.model, turns.len());

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PlannerError::Transport(format!("{}: {}", status, detail)));
        }

        let body: Value = response.json().await?;
        Self::decode(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_function_calls() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"functionCall": {"name": "list_doctors", "args": {}}},
                        {"functionCall": {"name": "get_doctor_availability",
                                          "args": {"doctor_name": "Ahuja", "date_str": "tomorrow"}}},
                    ]
                }
            }]
        });
        let decision = GeminiPlanner::decode(body).unwrap();
        match decision {
            PlannerDecision::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].name, "list_doctors");
                assert_eq!(calls[1].args["date_str"], "tomorrow");
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn decodes_text_reply() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "  All done.  "}]}
            }]
        });
        let decision = GeminiPlanner::decode(body).unwrap();
        assert!(matches!(decision, PlannerDecision::Reply(t) if t == "All done."));
    }

    #[test]
    fn empty_parts_fall_back_to_placeholder_reply() {
        let body = json!({"candidates": [{"content": {"parts": []}}]});
        let decision = GeminiPlanner::decode(body).unwrap();
        assert!(matches!(
            decision,
            PlannerDecision::Reply(t) if t == "Agent did not return a text reply."
        ));
    }

    #[test]
    fn missing_candidates_is_a_decode_error() {
        let err = GeminiPlanner::decode(json!({})).unwrap_err();
        assert!(matches!(err, PlannerError::Decode(_)));
    }
}
