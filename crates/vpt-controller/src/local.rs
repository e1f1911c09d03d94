//! A deterministic local controller used by tests and by hosts running
//! without a real device attached. Every command succeeds; every
//! verification succeeds unless its params carry `force_fail: true`, which
//! exists purely so tests can exercise the failure/retry paths.

use async_trait::async_trait;
use vpt_core::model::Verification;

use crate::{Controller, ControllerResult};

pub struct LocalController {
    device_model: String,
}

impl LocalController {
    pub fn new(device_model: impl Into<String>) -> Self {
        Self {
            device_model: device_model.into(),
        }
    }
}

#[async_trait]
impl Controller for LocalController {
    fn device_model(&self) -> &str {
        &self.device_model
    }

    async fn execute_command(
        &self,
        command: &str,
        params: &serde_json::Value,
    ) -> vpt_core::Result<ControllerResult> {
        if params.get("force_fail").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(ControllerResult::fail(format!("{command} forced to fail")));
        }
        Ok(ControllerResult::ok(format!("{command} executed")))
    }

    async fn execute_verification(
        &self,
        verification: &Verification,
    ) -> vpt_core::Result<ControllerResult> {
        if verification
            .params
            .get("force_fail")
            .and_then(|v| v.as_bool())
            == Some(true)
        {
            return Ok(ControllerResult::fail("verification did not match"));
        }
        let mut result = ControllerResult::ok(format!("{} verified", verification.command));
        result.extra = serde_json::json!({ "confidence": 0.95 });
        Ok(result)
    }

    async fn take_screenshot(&self, label: &str) -> vpt_core::Result<Option<String>> {
        Ok(Some(format!("/tmp/vpt-screenshots/{}/{label}.png", self.device_model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::{VerificationId, VerificationType};

    #[tokio::test]
    async fn command_succeeds_by_default() {
        let controller = LocalController::new("mock");
        let result = controller
            .execute_command("press_key", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn command_honors_force_fail() {
        let controller = LocalController::new("mock");
        let result = controller
            .execute_command("press_key", &serde_json::json!({"force_fail": true}))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn verification_succeeds_by_default() {
        let controller = LocalController::new("mock");
        let verification = Verification {
            id: VerificationId::new("v1"),
            verification_type: VerificationType::Text,
            command: "check_text".into(),
            params: [("text".to_string(), serde_json::json!("hello"))]
                .into_iter()
                .collect(),
        };
        let result = controller.execute_verification(&verification).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn screenshot_capture_returns_a_labeled_path() {
        let controller = LocalController::new("mock");
        let path = controller.take_screenshot("pre_step").await.unwrap();
        assert_eq!(path.as_deref(), Some("/tmp/vpt-screenshots/mock/pre_step.png"));
    }
}
