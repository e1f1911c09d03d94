//! Verification executor: runs a verification list against a controller,
//! flattens each type's response into a canonical result shape, and
//! applies an `all`/`any` pass policy.

use serde::{Deserialize, Serialize};
use vpt_core::model::{ExecutionContext, NodeId, ResultType, StepRecord, TreeId, Verification, VerificationType};
use vpt_controller::ControllerRegistry;
use vpt_store::{NodeExecutionRecord, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PassCondition {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStepResult {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub threshold: f64,
    pub result_type: ResultType,
    pub source_image_url: Option<String>,
    pub reference_image_url: Option<String>,
    pub result_overlay_url: Option<String>,
    pub extracted_text: Option<String>,
    pub detected_language: Option<String>,
    pub verification_type: VerificationType,
    pub execution_time_ms: u64,
    /// Type-specific extras (search_term/total_matches for adb, platform
    /// for appium, motion_threshold/duration for audio/video, ...) merged
    /// in verbatim from the controller's response.
    #[serde(flatten)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationBatchResult {
    pub success: bool,
    pub total_count: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub results: Vec<VerificationStepResult>,
    pub message: String,
}

fn filter_valid(verifications: &[Verification]) -> Vec<&Verification> {
    verifications.iter().filter(|v| v.is_valid()).collect()
}

fn extract_threshold(extra: &serde_json::Value, params: &std::collections::HashMap<String, serde_json::Value>) -> f64 {
    extra
        .get("threshold")
        .and_then(|v| v.as_f64())
        .or_else(|| extra.get("confidence").and_then(|v| v.as_f64()))
        .or_else(|| params.get("userThreshold").and_then(|v| v.as_f64()))
        .unwrap_or(0.8)
}

fn extract_str(extra: &serde_json::Value, key: &str) -> Option<String> {
    extra.get(key).and_then(|v| v.as_str()).map(String::from)
}

async fn execute_single(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    verification: &Verification,
    tree_id: Option<&TreeId>,
    node_id: Option<&NodeId>,
    context: &ExecutionContext,
) -> VerificationStepResult {
    let start = std::time::Instant::now();

    let controller_result = match controllers.get(&context.device_model) {
        Some(controller) => controller.execute_verification(verification).await,
        None => Err(vpt_core::Error::controller(
            "no controller registered for current device",
        )),
    };

    let execution_time_ms = start.elapsed().as_millis() as u64;

    let (success, message, error, extra) = match controller_result {
        Ok(r) => (r.success, r.message, r.error, r.extra),
        Err(e) => (false, None, Some(e.to_string()), serde_json::json!({})),
    };

    if let (Some(tree_id), Some(node_id)) = (tree_id, node_id) {
        let _ = store
            .record_node_execution(NodeExecutionRecord {
                team_id: context.team_id.clone(),
                tree_id: tree_id.clone(),
                node_id: node_id.clone(),
                host_name: context.host.clone(),
                success,
                execution_time_ms,
                message: message.clone(),
                script_result_id: context.script_result_id.clone(),
                script_context: context.script_context.clone(),
                recorded_at: chrono::Utc::now(),
            })
            .await;
    }

    VerificationStepResult {
        success,
        message,
        error,
        threshold: extract_threshold(&extra, &verification.params),
        result_type: ResultType::from_success(success),
        source_image_url: extract_str(&extra, "sourceImageUrl"),
        reference_image_url: extract_str(&extra, "referenceImageUrl"),
        result_overlay_url: extract_str(&extra, "resultOverlayUrl"),
        extracted_text: extract_str(&extra, "extractedText"),
        detected_language: extract_str(&extra, "detectedLanguage"),
        verification_type: verification.verification_type,
        execution_time_ms,
        details: extra,
    }
}

/// `node_id`/`tree_id` are only needed to record per-node outcomes; pass
/// `None` for ad hoc verification calls that aren't tied to a navigation
/// node.
#[allow(clippy::too_many_arguments)]
pub async fn execute_verifications(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    verifications: &[Verification],
    tree_id: Option<&TreeId>,
    node_id: Option<&NodeId>,
    pass_condition: PassCondition,
    context: &mut ExecutionContext,
) -> VerificationBatchResult {
    if verifications.is_empty() {
        return VerificationBatchResult {
            success: true,
            total_count: 0,
            passed_count: 0,
            failed_count: 0,
            results: Vec::new(),
            message: "No verifications to execute".to_string(),
        };
    }

    let valid = filter_valid(verifications);
    let mut results = Vec::with_capacity(valid.len());
    for verification in &valid {
        results.push(execute_single(store, controllers, verification, tree_id, node_id, &*context).await);
    }

    let passed_count = results.iter().filter(|r| r.success).count();
    let total_count = results.len();
    let success = match pass_condition {
        PassCondition::All => total_count > 0 && passed_count == total_count,
        PassCondition::Any => passed_count > 0,
    };
    let message = format!("Verification completed: {passed_count}/{total_count} passed");

    context.record_step(StepRecord {
        success,
        screenshot_path: None,
        message: message.clone(),
        execution_time_ms: results.iter().map(|r| r.execution_time_ms).sum(),
        from_node: None,
        to_node: node_id.cloned(),
        actions: Vec::new(),
        retry_actions: Vec::new(),
        failure_actions: Vec::new(),
        verifications: valid.iter().map(|v| (*v).clone()).collect(),
        verification_results: results
            .iter()
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .collect(),
    });

    VerificationBatchResult {
        success,
        total_count,
        passed_count,
        failed_count: total_count - passed_count,
        message,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpt_core::model::{DeviceId, HostName, TeamId, VerificationId};
    use vpt_controller::local::LocalController;
    use vpt_store::memory::InMemoryStore;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(HostName::new("host1"), DeviceId::new("dev1"), TeamId::new("team1"));
        ctx.device_model = "mock".to_string();
        ctx.tree_id = Some("tree1".into());
        ctx
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(Arc::new(LocalController::new("mock")));
        registry
    }

    fn text_verification(force_fail: bool) -> Verification {
        let mut params = std::collections::HashMap::new();
        params.insert("text".to_string(), serde_json::json!("hello"));
        if force_fail {
            params.insert("force_fail".to_string(), serde_json::json!(true));
        }
        Verification {
            id: VerificationId::new_uuid(),
            verification_type: VerificationType::Text,
            command: "check_text".into(),
            params,
        }
    }

    #[tokio::test]
    async fn empty_list_succeeds_trivially() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result =
            execute_verifications(&store, &registry(), &[], None, None, PassCondition::All, &mut context).await;
        assert!(result.success);
        assert_eq!(result.message, "No verifications to execute");
        assert!(context.step_results.is_empty());
    }

    #[tokio::test]
    async fn missing_minimum_params_are_filtered_silently() {
        let store = InMemoryStore::new();
        let invalid = Verification {
            id: VerificationId::new_uuid(),
            verification_type: VerificationType::Image,
            command: "check_image".into(),
            params: std::collections::HashMap::new(),
        };
        let mut context = ctx();
        let result = execute_verifications(
            &store,
            &registry(),
            &[invalid],
            None,
            None,
            PassCondition::All,
            &mut context,
        )
        .await;
        assert_eq!(result.total_count, 0);
    }

    #[tokio::test]
    async fn all_condition_requires_every_pass() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_verifications(
            &store,
            &registry(),
            &[text_verification(false), text_verification(true)],
            None,
            None,
            PassCondition::All,
            &mut context,
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.passed_count, 1);
        assert_eq!(context.step_results.len(), 1);
        assert_eq!(context.step_results[0].verifications.len(), 2);
    }

    #[tokio::test]
    async fn any_condition_requires_one_pass() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_verifications(
            &store,
            &registry(),
            &[text_verification(false), text_verification(true)],
            None,
            None,
            PassCondition::Any,
            &mut context,
        )
        .await;
        assert!(result.success);
    }
}
