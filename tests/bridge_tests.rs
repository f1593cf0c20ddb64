//! Integration tests for the NL-to-query bridge
//!
//! The bridge's contract is that it never fails its caller; every upstream
//! failure mode must come back as a structurally valid, degraded plan. The
//! caller-side gate integration is exercised here too, since the bridge
//! itself never runs the safety gate.

use async_trait::async_trait;

use dataset_workbench::bridge::{self, BridgeError, MockReasoningClient, ReasoningClient};
use dataset_workbench::sql_safety::{check_sql, enforce_limit};

fn columns() -> Vec<String> {
    vec!["city".to_string(), "amount".to_string()]
}

#[tokio::test]
async fn test_plan_success_shape() {
    let client = MockReasoningClient::replying(
        r#"{"answer":"Oslo has the most orders.","query":"SELECT city, COUNT(*) AS n FROM ds1_v1 GROUP BY city","chart":{"type":"bar","x":"city","y":"n"}}"#,
    );
    let plan = bridge::plan(&client, "which city?", "ds1_v1", &columns(), "city,amount\n").await;

    assert!(!plan.is_degraded());
    assert_eq!(plan.answer, "Oslo has the most orders.");
    assert!(plan.chart.is_some());

    // Caller-side integration: the produced query must pass the gate and
    // pick up a row ceiling before it may reach the warehouse.
    let query = plan.query.expect("query present");
    check_sql(&query).expect("bridge query is read-only");
    let bounded = enforce_limit(&query, 500);
    assert!(bounded.ends_with("LIMIT 500"));
}

#[tokio::test]
async fn test_malformed_response_degrades() {
    for garbage in [
        "no json here",
        "<html>502 Bad Gateway</html>",
        "[\"an\",\"array\"]",
        "```json\nstill not an object\n```",
    ] {
        let client = MockReasoningClient::replying(garbage);
        let plan = bridge::plan(&client, "q", "t", &columns(), "").await;
        assert!(plan.is_degraded(), "input {garbage:?} must degrade");
        assert!(plan.query.is_none());
        assert!(plan.chart.is_none());
        assert!(!plan.answer.is_empty());
    }
}

#[tokio::test]
async fn test_network_failure_degrades() {
    let client = MockReasoningClient::failing();
    let plan = bridge::plan(&client, "q", "t", &columns(), "").await;
    assert!(plan.is_degraded());
    assert!(plan.error.as_deref().unwrap().starts_with("connection"));
}

#[tokio::test]
async fn test_custom_client_timeout_degrades() {
    struct TimingOut;

    #[async_trait]
    impl ReasoningClient for TimingOut {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, BridgeError> {
            Err(BridgeError::Timeout(60))
        }

        fn model_name(&self) -> &str {
            "timing-out"
        }
    }

    let plan = bridge::plan(&TimingOut, "q", "t", &columns(), "").await;
    assert!(plan.is_degraded());
    assert!(plan.error.as_deref().unwrap().starts_with("timeout"));
}

#[tokio::test]
async fn test_unsafe_bridge_query_blocked_by_caller_gate() {
    // The bridge passes through whatever query the service produced; the
    // gate is the enforcement boundary for destructive intent.
    let client =
        MockReasoningClient::replying(r#"{"answer":"done","query":"DROP TABLE datasets"}"#);
    let plan = bridge::plan(&client, "q", "t", &columns(), "").await;
    assert!(!plan.is_degraded());
    let query = plan.query.expect("query present");
    let err = check_sql(&query).unwrap_err();
    assert!(err.to_string().contains("DROP"));
}

#[tokio::test]
async fn test_answer_only_plan() {
    let client = MockReasoningClient::replying(
        r#"{"answer":"There are 3 rows.","query":null,"chart":null}"#,
    );
    let plan = bridge::plan(&client, "how many rows?", "t", &columns(), "").await;
    assert!(!plan.is_degraded());
    assert!(plan.query.is_none());
    assert!(plan.chart.is_none());
    assert_eq!(plan.answer, "There are 3 rows.");
}
