//! Standard block executor: a registry of programmable units discovered
//! at startup (sleep, evaluate_condition, get_menu_info) plus the thin
//! `list_blocks`/`execute` facade callers use instead of touching the
//! registry directly.

use std::sync::Arc;

pub mod blocks;
pub mod registry;

pub use registry::{Block, BlockExecutionRecord, BlockExecutionStatus, BlockInfo, BlockResult, BlockRegistry};

/// Builds the registry of blocks shipped with the host, mirroring the
/// original discovery step that scans a built-in `blocks/` directory.
pub fn standard_block_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register(Arc::new(blocks::sleep::SleepBlock));
    registry.register(Arc::new(blocks::evaluate::EvaluateConditionBlock));
    registry.register(Arc::new(blocks::menu_info::GetMenuInfoBlock));
    registry
}

pub fn list_blocks(registry: &BlockRegistry) -> Vec<BlockInfo> {
    registry.list()
}

pub async fn execute(
    registry: &BlockRegistry,
    command: &str,
    params: &serde_json::Value,
    context: &vpt_core::model::ExecutionContext,
) -> BlockResult {
    registry.execute(command, params, context).await
}
