//! The four gates as model-callable tools.
//!
//! All tools of one turn share the same [`Turn`], so the model cannot skip
//! a perimeter or call them out of order. A deny comes back as a refused
//! [`ToolResult`] carrying the reason; a PDP failure or an out-of-order call
//! is a [`ToolError`].

use crate::action::{AgentAction, FULL_MARKET_ACCESS};
use crate::error::{GateError, Perimeter};
use crate::turn::Turn;
use advisorguard_core::{CertificationLevel, Document, DraftResponse, Query, Tool, ToolError, ToolRegistry, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedTurn = Arc<Mutex<Turn>>;

pub const VALIDATE_QUERY: &str = "validate_financial_query";
pub const ACCESS_KNOWLEDGE: &str = "access_financial_knowledge";
pub const CHECK_ACTION: &str = "check_action_permissions";
pub const VALIDATE_RESPONSE: &str = "validate_financial_response";

fn gate_failure(tool_name: &str, e: GateError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(arguments: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// One action, an `actions` array, or the `full_market_access` composite.
fn parse_actions(mut arguments: serde_json::Value) -> Result<Vec<AgentAction>, ToolError> {
    if let Some(actions) = arguments.get_mut("actions") {
        return parse(actions.take());
    }
    if arguments.get("action").and_then(|a| a.as_str()) == Some(FULL_MARKET_ACCESS) {
        return Ok(AgentAction::market_access());
    }
    parse(arguments).map(|action| vec![action])
}

/// Prompt perimeter.
pub struct ValidateQueryTool {
    turn: SharedTurn,
}

impl ValidateQueryTool {
    pub fn new(turn: SharedTurn) -> Self {
        Self { turn }
    }
}

#[async_trait]
impl Tool for ValidateQueryTool {
    fn name(&self) -> &str {
        VALIDATE_QUERY
    }

    fn description(&self) -> &str {
        "Check whether the user may receive an answer to this financial question."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "portfolio_value": { "type": "number" },
                "risk_profile": { "type": "string" },
                "investment_horizon": { "type": "string" }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, call_id: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query: Query = parse(arguments)?;
        let decision = self
            .turn
            .lock()
            .await
            .check_prompt(query)
            .await
            .map_err(|e| gate_failure(VALIDATE_QUERY, e))?;

        let data = json!(decision);
        Ok(match decision.reason {
            None => ToolResult::ok(call_id, "Query allowed"),
            Some(reason) => ToolResult::refused(call_id, reason),
        }
        .with_data(data))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KnowledgeScope {
    #[default]
    Documents,
    Categories,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgeArgs {
    #[serde(default)]
    scope: KnowledgeScope,
    #[serde(default)]
    doc_type: Option<String>,
}

/// Retrieval perimeter over a fixed document set.
pub struct AccessKnowledgeTool {
    turn: SharedTurn,
    documents: Arc<Vec<Document>>,
}

impl AccessKnowledgeTool {
    pub fn new(turn: SharedTurn, documents: Arc<Vec<Document>>) -> Self {
        Self { turn, documents }
    }
}

#[async_trait]
impl Tool for AccessKnowledgeTool {
    fn name(&self) -> &str {
        ACCESS_KNOWLEDGE
    }

    fn description(&self) -> &str {
        "Retrieve the financial documents, or documentation categories, this user may see."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "scope": { "type": "string", "enum": ["documents", "categories"] },
                "doc_type": { "type": "string", "description": "Only documents of this type" }
            }
        })
    }

    async fn execute(&self, call_id: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: KnowledgeArgs = if arguments.is_null() { KnowledgeArgs::default() } else { parse(arguments)? };
        let mut turn = self.turn.lock().await;

        match args.scope {
            KnowledgeScope::Categories => {
                let categories = turn
                    .allowed_categories()
                    .await
                    .map_err(|e| gate_failure(ACCESS_KNOWLEDGE, e))?;
                Ok(ToolResult::ok(call_id, categories.join(", ")).with_data(json!(categories)))
            }
            KnowledgeScope::Documents => {
                let candidates: Vec<Document> = self
                    .documents
                    .iter()
                    .filter(|d| args.doc_type.as_deref().is_none_or(|t| d.doc_type == t))
                    .cloned()
                    .collect();
                let visible = turn
                    .filter_documents(&candidates)
                    .await
                    .map_err(|e| gate_failure(ACCESS_KNOWLEDGE, e))?;

                let output = if visible.is_empty() {
                    "No documents available for this user".to_string()
                } else {
                    visible
                        .iter()
                        .map(|d| format!("[{}] ({}) {}", d.id, d.doc_type, d.content))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                Ok(ToolResult::ok(call_id, output).with_data(json!(visible)))
            }
        }
    }
}

/// Action perimeter.
pub struct ActionPermissionsTool {
    turn: SharedTurn,
}

impl ActionPermissionsTool {
    pub fn new(turn: SharedTurn) -> Self {
        Self { turn }
    }
}

#[async_trait]
impl Tool for ActionPermissionsTool {
    fn name(&self) -> &str {
        CHECK_ACTION
    }

    fn description(&self) -> &str {
        "Check whether an action, or a set of actions that must all be allowed, may be performed on the user's behalf before performing it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [
                        "basic_advice",
                        "portfolio_analysis",
                        "specific_recommendations",
                        "update_portfolio",
                        "access_api_endpoint",
                        FULL_MARKET_ACCESS
                    ]
                },
                "portfolio_id": { "type": "string" },
                "endpoint": { "type": "string" },
                "actions": {
                    "type": "array",
                    "description": "Actions that are only useful together; all must be allowed",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": { "type": "string" },
                            "portfolio_id": { "type": "string" },
                            "endpoint": { "type": "string" }
                        },
                        "required": ["action"]
                    }
                }
            }
        })
    }

    async fn execute(&self, call_id: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let actions = parse_actions(arguments)?;
        let mut turn = self.turn.lock().await;
        let decision = match actions.as_slice() {
            [action] => turn.authorize_action(action).await,
            _ => turn.authorize_actions(&actions).await,
        }
        .map_err(|e| gate_failure(CHECK_ACTION, e))?;

        Ok(match decision.reason {
            None => {
                let names: Vec<String> = actions.iter().map(ToString::to_string).collect();
                ToolResult::ok(call_id, format!("Authorized: {}", names.join(", ")))
            }
            Some(reason) => ToolResult::refused(call_id, reason),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ResponseArgs {
    answer: String,
    #[serde(default)]
    certification_level: Option<CertificationLevel>,
}

/// Response perimeter.
pub struct ValidateResponseTool {
    turn: SharedTurn,
}

impl ValidateResponseTool {
    pub fn new(turn: SharedTurn) -> Self {
        Self { turn }
    }
}

#[async_trait]
impl Tool for ValidateResponseTool {
    fn name(&self) -> &str {
        VALIDATE_RESPONSE
    }

    fn description(&self) -> &str {
        "Apply disclaimers and risk warnings to a drafted answer. Returns the text to deliver."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string" },
                "certification_level": { "type": "string", "enum": ["general", "professional", "expert"] }
            },
            "required": ["answer"]
        })
    }

    async fn execute(&self, call_id: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: ResponseArgs = parse(arguments)?;
        let mut response = DraftResponse::new(args.answer);
        response.certification_level = args.certification_level;

        let decision = self
            .turn
            .lock()
            .await
            .enforce_response(&mut response)
            .await
            .map_err(|e| gate_failure(VALIDATE_RESPONSE, e))?;

        let data = json!({ "decision": decision, "response": response });
        Ok(match decision.reason {
            None => ToolResult::ok(call_id, response.answer),
            Some(reason) => ToolResult::refused(call_id, reason),
        }
        .with_data(data))
    }
}

/// Registry with the tools for `perimeters`, all bound to `turn`.
pub fn gate_registry(turn: SharedTurn, documents: Arc<Vec<Document>>, perimeters: &[Perimeter]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for perimeter in perimeters {
        let tool: Box<dyn Tool> = match perimeter {
            Perimeter::Prompt => Box::new(ValidateQueryTool::new(turn.clone())),
            Perimeter::Retrieval => Box::new(AccessKnowledgeTool::new(turn.clone(), documents.clone())),
            Perimeter::Action => Box::new(ActionPermissionsTool::new(turn.clone())),
            Perimeter::Response => Box::new(ValidateResponseTool::new(turn.clone())),
        };
        registry.register(tool);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::classify::KeywordClassifier;
    use crate::testing::ScriptedPdp;
    use crate::turn::{PerimeterPipeline, TurnState};
    use advisorguard_config::AppConfig;
    use advisorguard_core::{Subject, ToolCall};

    fn docs() -> Arc<Vec<Document>> {
        Arc::new(vec![
            Document::new("inv_001", "investment", "Tech Growth Fund", "confidential"),
            Document::new("ret_001", "retirement", "401(k) basics", "public"),
            Document::new("inv_002", "investment", "ESG Fund", "public"),
        ])
    }

    fn setup(pdp: ScriptedPdp) -> (SharedTurn, ToolRegistry) {
        let pipeline = PerimeterPipeline::new(
            Arc::new(pdp),
            Arc::new(KeywordClassifier),
            Arc::new(AuditLogger::new()),
            &AppConfig::default(),
        );
        let turn = Arc::new(Mutex::new(pipeline.begin(Subject::new("user@example.com"))));
        let registry = gate_registry(
            turn.clone(),
            docs(),
            &[Perimeter::Prompt, Perimeter::Retrieval, Perimeter::Action, Perimeter::Response],
        );
        (turn, registry)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    fn public_only() -> ScriptedPdp {
        ScriptedPdp::new(|_, _, resource| {
            Ok(resource
                .attribute("classification")
                .and_then(|v| v.as_str())
                .is_none_or(|c| c == "public"))
        })
    }

    #[test]
    fn registry_exposes_requested_perimeters() {
        let (turn, _) = setup(ScriptedPdp::allow_all());
        let registry = gate_registry(turn, docs(), &[Perimeter::Retrieval, Perimeter::Action]);
        assert_eq!(registry.names(), vec![ACCESS_KNOWLEDGE, CHECK_ACTION]);
    }

    #[tokio::test]
    async fn tools_drive_the_shared_turn() {
        let (turn, registry) = setup(public_only());

        let result = registry
            .execute(&call(VALIDATE_QUERY, json!({"question": "What is a 401(k)?"})))
            .await
            .unwrap();
        assert!(result.success);

        let result = registry.execute(&call(ACCESS_KNOWLEDGE, json!({}))).await.unwrap();
        assert!(result.output.contains("ret_001"));
        assert!(result.output.contains("inv_002"));
        assert!(!result.output.contains("inv_001"));

        let result = registry
            .execute(&call(CHECK_ACTION, json!({"action": "basic_advice"})))
            .await
            .unwrap();
        assert_eq!(result.output, "Authorized: basic_advice");

        let result = registry
            .execute(&call(VALIDATE_RESPONSE, json!({"answer": "I recommend a broad stock fund."})))
            .await
            .unwrap();
        assert!(result.output.contains("IMPORTANT DISCLAIMER"));
        assert_eq!(turn.lock().await.state(), TurnState::ResponseChecked);
    }

    #[tokio::test]
    async fn doc_type_narrows_candidates() {
        let (_, registry) = setup(ScriptedPdp::allow_all());
        registry
            .execute(&call(VALIDATE_QUERY, json!({"question": "hi"})))
            .await
            .unwrap();
        let result = registry
            .execute(&call(ACCESS_KNOWLEDGE, json!({"doc_type": "retirement"})))
            .await
            .unwrap();
        assert_eq!(result.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denied_action_is_refused_result() {
        let (_, registry) = setup(ScriptedPdp::new(|_, action, _| Ok(action != "update")));
        registry
            .execute(&call(VALIDATE_QUERY, json!({"question": "hi"})))
            .await
            .unwrap();
        let result = registry
            .execute(&call(CHECK_ACTION, json!({"action": "update_portfolio", "portfolio_id": "pf_9"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Not authorized to perform update_portfolio(pf_9)");
    }

    #[tokio::test]
    async fn full_market_access_needs_both_endpoints() {
        let (turn, registry) = setup(ScriptedPdp::new(|_, action, resource| {
            Ok(action != "access" || resource.attribute("endpoint").and_then(|v| v.as_str()) == Some("market_data"))
        }));
        registry
            .execute(&call(VALIDATE_QUERY, json!({"question": "hi"})))
            .await
            .unwrap();
        let result = registry
            .execute(&call(CHECK_ACTION, json!({"action": "full_market_access"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("access_api_endpoint(portfolio_analysis)"));
        assert_eq!(turn.lock().await.state(), TurnState::Denied);
    }

    #[tokio::test]
    async fn action_array_is_authorized_together() {
        let (turn, registry) = setup(ScriptedPdp::allow_all());
        registry
            .execute(&call(VALIDATE_QUERY, json!({"question": "hi"})))
            .await
            .unwrap();
        let result = registry
            .execute(&call(
                CHECK_ACTION,
                json!({"actions": [
                    {"action": "basic_advice"},
                    {"action": "access_api_endpoint", "endpoint": "market_data"}
                ]}),
            ))
            .await
            .unwrap();
        assert_eq!(result.output, "Authorized: basic_advice, access_api_endpoint(market_data)");
        assert_eq!(turn.lock().await.state(), TurnState::ActionChecked);
    }

    #[tokio::test]
    async fn skipping_the_prompt_gate_is_an_error() {
        let (_, registry) = setup(ScriptedPdp::allow_all());
        let err = registry.execute(&call(ACCESS_KNOWLEDGE, json!({}))).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("out of order"));
    }

    #[tokio::test]
    async fn bad_arguments_are_rejected() {
        let (_, registry) = setup(ScriptedPdp::allow_all());
        let err = registry
            .execute(&call(VALIDATE_QUERY, json!({"portfolio_value": 10})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
