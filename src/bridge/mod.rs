//! NL-to-query bridge
//!
//! Turns a free-text question plus table schema plus a small data sample
//! into a structured [`Plan`]. The one absolute contract here is that
//! [`plan`] never fails its caller: missing configuration, network trouble,
//! and malformed service responses all collapse into a degraded plan whose
//! `error` field names the cause.
//!
//! The bridge does not run the safety gate itself. A correct integration
//! interposes [`crate::sql_safety::check_sql`] between every plan-produced
//! query and the warehouse.

mod client;
mod error;
mod prompt;

pub use client::{ChatClient, MockReasoningClient, ReasoningClient, API_KEY_ENV, BASE_URL_ENV};
pub use error::BridgeError;
pub use prompt::PromptContext;

use serde::{Deserialize, Serialize};

/// Message shown when the plan degrades instead of answering.
const FALLBACK_ANSWER: &str =
    "The assistant could not produce a plan for this question. \
     Quick analysis and manual SQL still work.";

/// Chart families the presentation layer can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

/// Optional chart suggestion attached to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
}

/// Structured result of one planning request.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Natural-language answer, or a fallback message on degradation.
    pub answer: String,
    /// Candidate read query. Must pass the safety gate before execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Optional chart suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    /// Machine-readable cause when the plan degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Plan {
    fn degraded(cause: String) -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            query: None,
            chart: None,
            error: Some(cause),
        }
    }

    /// Whether this plan came out of the fallback path.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Ask the reasoning service for a plan. Never fails the caller.
pub async fn plan(
    client: &dyn ReasoningClient,
    question: &str,
    table_name: &str,
    columns: &[String],
    sample_csv: &str,
) -> Plan {
    let ctx = PromptContext {
        prompt: question,
        table_name,
        columns,
        sample_csv,
    };

    match client.complete(&ctx.system(), &ctx.user()).await {
        Ok(text) => parse_plan(&text).unwrap_or_else(|err| {
            tracing::warn!(model = client.model_name(), %err, "unusable reasoning response");
            Plan::degraded(format!("{}: {err}", err.cause()))
        }),
        Err(err) => {
            tracing::warn!(model = client.model_name(), %err, "reasoning request failed");
            Plan::degraded(format!("{}: {err}", err.cause()))
        }
    }
}

/// Decode the service's completion into a plan.
///
/// Tolerant where real model output drifts from the letter of the prompt:
/// Markdown code fences are stripped, and the query may arrive under either
/// a `query` or a `sql` key. Anything that is not a JSON object is an error
/// and sends the caller down the fallback path.
fn parse_plan(text: &str) -> Result<Plan, BridgeError> {
    let body = strip_code_fence(text.trim());
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| BridgeError::Parse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| BridgeError::Parse("response is not a JSON object".to_string()))?;

    let answer = obj
        .get("answer")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let query = obj
        .get("query")
        .or_else(|| obj.get("sql"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let chart = obj
        .get("chart")
        .cloned()
        .and_then(|v| serde_json::from_value::<ChartSpec>(v).ok());

    Ok(Plan {
        answer,
        query,
        chart,
        error: None,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["city".to_string(), "amount".to_string()]
    }

    #[tokio::test]
    async fn test_plan_success() {
        let client = MockReasoningClient::replying(
            r#"{"answer":"Oslo leads","query":"SELECT city, SUM(amount) FROM t GROUP BY city","chart":{"type":"bar","x":"city","y":"amount"}}"#,
        );
        let plan = plan(&client, "top city?", "t", &columns(), "city,amount\n").await;
        assert!(!plan.is_degraded());
        assert_eq!(plan.answer, "Oslo leads");
        assert!(plan.query.as_deref().unwrap().starts_with("SELECT"));
        assert_eq!(
            plan.chart,
            Some(ChartSpec {
                kind: ChartKind::Bar,
                x: "city".to_string(),
                y: "amount".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_plan_accepts_sql_key_and_fences() {
        let client = MockReasoningClient::replying(
            "```json\n{\"answer\":\"ok\",\"sql\":\"SELECT 1\"}\n```",
        );
        let plan = plan(&client, "q", "t", &columns(), "").await;
        assert_eq!(plan.query.as_deref(), Some("SELECT 1"));
        assert!(plan.error.is_none());
    }

    #[tokio::test]
    async fn test_plan_never_fails_on_garbage() {
        let client = MockReasoningClient::replying("this is not json at all");
        let plan = plan(&client, "q", "t", &columns(), "").await;
        assert!(plan.is_degraded());
        assert!(plan.query.is_none());
        assert!(plan.chart.is_none());
        assert!(plan.error.as_deref().unwrap().starts_with("parse_error"));
    }

    #[tokio::test]
    async fn test_plan_never_fails_on_connection_error() {
        let client = MockReasoningClient::failing();
        let plan = plan(&client, "q", "t", &columns(), "").await;
        assert!(plan.is_degraded());
        assert!(plan.error.as_deref().unwrap().starts_with("connection"));
        assert_eq!(plan.answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_unknown_chart_type_dropped() {
        let client = MockReasoningClient::replying(
            r#"{"answer":"ok","query":"SELECT 1","chart":{"type":"pie","x":"a","y":"b"}}"#,
        );
        let plan = plan(&client, "q", "t", &columns(), "").await;
        // An unrenderable chart spec degrades to no chart, not to an error.
        assert!(plan.chart.is_none());
        assert!(plan.error.is_none());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_non_object_response_is_parse_error() {
        assert!(parse_plan("[1,2,3]").is_err());
        assert!(parse_plan("\"just a string\"").is_err());
    }
}
