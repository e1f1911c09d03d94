//! Block registry: a pluggable set of programmable units discovered at
//! startup, not tied to navigation edges. Mirrors the read-only-capable,
//! prompt-carrying tool registry idiom used for the agent's own tool
//! surface, generalized so blocks key off a command string instead of an
//! LLM tool name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vpt_core::model::ExecutionContext;

/// Typed parameter descriptor surfaced by `get_block_info()` in the
/// original block files, kept here as static metadata for discovery
/// endpoints (`GET /host/builder/...`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockParamInfo {
    pub name: String,
    pub param_type: String,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub command: String,
    pub description: String,
    pub params: Vec<BlockParamInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BlockResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: serde_json::json!({}),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: serde_json::json!({}),
        }
    }
}

#[async_trait]
pub trait Block: Send + Sync {
    fn info(&self) -> BlockInfo;

    fn command(&self) -> String {
        self.info().command
    }

    async fn execute(
        &self,
        context: &ExecutionContext,
        params: &serde_json::Value,
    ) -> BlockResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockExecutionRecord {
    pub status: BlockExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub progress: serde_json::Value,
    pub result: Option<BlockResult>,
    pub error: Option<String>,
}

/// Caches discovery and dispatches `execute_block(command, params, context)`
/// calls by command name. Unknown commands return `{success:false,
/// available_blocks:[...]}` rather than erroring, matching the original
/// registry's self-describing failure shape.
#[derive(Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, Arc<dyn Block>>,
    async_executions: DashMap<String, BlockExecutionRecord>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, block: Arc<dyn Block>) {
        self.blocks.insert(block.command(), block);
    }

    pub fn list(&self) -> Vec<BlockInfo> {
        self.blocks.values().map(|b| b.info()).collect()
    }

    pub async fn execute(
        &self,
        command: &str,
        params: &serde_json::Value,
        context: &ExecutionContext,
    ) -> BlockResult {
        match self.blocks.get(command) {
            Some(block) => block.execute(context, params).await,
            None => {
                let available: Vec<String> = self.blocks.keys().cloned().collect();
                let mut result = BlockResult::fail(format!("unknown block command: {command}"));
                result.data = serde_json::json!({ "available_blocks": available });
                result
            }
        }
    }

    /// Long-block async path: generates an execution id, records a
    /// `Running` entry, spawns the block on the runtime, and returns the
    /// id immediately so the caller can poll `execution_status`.
    pub fn execute_async(
        self: &Arc<Self>,
        command: String,
        params: serde_json::Value,
        context: ExecutionContext,
    ) -> String {
        let execution_id = Uuid::new_v4().to_string();
        self.async_executions.insert(
            execution_id.clone(),
            BlockExecutionRecord {
                status: BlockExecutionStatus::Running,
                start_time: Utc::now(),
                progress: serde_json::json!({}),
                result: None,
                error: None,
            },
        );

        let registry = self.clone();
        let id_for_task = execution_id.clone();
        tokio::spawn(async move {
            let result = registry.execute(&command, &params, &context).await;
            let status = if result.success {
                BlockExecutionStatus::Completed
            } else {
                BlockExecutionStatus::Failed
            };
            let error = if result.success {
                None
            } else {
                result.message.clone()
            };
            if let Some(mut entry) = registry.async_executions.get_mut(&id_for_task) {
                entry.status = status;
                entry.error = error;
                entry.result = Some(result);
            }
        });

        execution_id
    }

    pub fn execution_status(&self, execution_id: &str) -> Option<BlockExecutionRecord> {
        self.async_executions.get(execution_id).map(|e| e.clone())
    }
}
