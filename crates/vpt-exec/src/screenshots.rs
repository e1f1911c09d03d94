//! Screenshot manager: a named capture hook invoked pre/post execution by
//! higher-level drivers (navigation executor, script harness). Not invoked
//! by the orchestrator itself, nor by the action/verification executors —
//! those stay agnostic of screenshots the same way they stay agnostic of
//! edges and nodes.

use vpt_controller::ControllerRegistry;

/// Captures a screenshot labeled `label` via the controller registered for
/// `device_model`. Returns `None` if no controller is registered, or if the
/// controller doesn't support capture, or on any capture error — a missing
/// screenshot never fails the step it's attached to.
pub async fn capture(controllers: &ControllerRegistry, device_model: &str, label: &str) -> Option<String> {
    let controller = controllers.get(device_model)?;
    match controller.take_screenshot(label).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, label, "screenshot capture failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpt_controller::local::LocalController;

    #[tokio::test]
    async fn captures_via_the_registered_controller() {
        let mut registry = ControllerRegistry::new();
        registry.register(Arc::new(LocalController::new("mock")));
        let path = capture(&registry, "mock", "pre_step").await;
        assert!(path.is_some());
    }

    #[tokio::test]
    async fn missing_controller_yields_no_screenshot() {
        let registry = ControllerRegistry::new();
        assert!(capture(&registry, "mock", "pre_step").await.is_none());
    }
}
