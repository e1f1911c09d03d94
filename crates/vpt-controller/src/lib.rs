//! The controller capability contract: a narrow interface implemented per
//! device kind (ADB, Appium, web drivers, AV capture, remote codes). The
//! core never knows how a controller produces its answer — only that it
//! can run a command and check a verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vpt_core::model::Verification;

pub mod local;

/// Outcome of a single controller call, already in the canonical shape the
/// verification/action executors flatten into a step record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControllerResult {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    /// Type-specific extras (confidence, extracted text, overlay urls, ...)
    /// merged verbatim into the flattened verification result.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl ControllerResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            extra: serde_json::json!({}),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            extra: serde_json::json!({}),
        }
    }
}

/// Per-device-type capability implementation. Internals (image
/// recognition, OCR, audio transcription, ...) are opaque to the core.
#[async_trait]
pub trait Controller: Send + Sync {
    fn device_model(&self) -> &str;

    async fn execute_command(
        &self,
        command: &str,
        params: &serde_json::Value,
    ) -> vpt_core::Result<ControllerResult>;

    async fn execute_verification(
        &self,
        verification: &Verification,
    ) -> vpt_core::Result<ControllerResult>;

    /// Captures a named screenshot (e.g. `pre_step`, `post_step`,
    /// `analysis`). Most controller kinds don't carry capture hardware, so
    /// the default is a no-op returning no path rather than an error.
    async fn take_screenshot(&self, _label: &str) -> vpt_core::Result<Option<String>> {
        Ok(None)
    }
}

/// Registry of controllers keyed by device model, mirroring the registry
/// idiom used for pluggable command handlers elsewhere in the workspace.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: std::collections::HashMap<String, std::sync::Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, controller: std::sync::Arc<dyn Controller>) {
        self.controllers
            .insert(controller.device_model().to_string(), controller);
    }

    pub fn get(&self, device_model: &str) -> Option<std::sync::Arc<dyn Controller>> {
        self.controllers.get(device_model).cloned()
    }
}
