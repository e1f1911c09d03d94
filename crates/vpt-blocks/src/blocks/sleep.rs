use async_trait::async_trait;
use vpt_core::model::ExecutionContext;

use crate::registry::{Block, BlockInfo, BlockParamInfo, BlockResult};

pub struct SleepBlock;

#[async_trait]
impl Block for SleepBlock {
    fn info(&self) -> BlockInfo {
        BlockInfo {
            command: "sleep".into(),
            description: "pauses execution for a fixed duration".into(),
            params: vec![BlockParamInfo {
                name: "duration_ms".into(),
                param_type: "int".into(),
                required: true,
                default: Some(serde_json::json!(1000)),
            }],
        }
    }

    async fn execute(&self, _context: &ExecutionContext, params: &serde_json::Value) -> BlockResult {
        let duration_ms = params
            .get("duration_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000);
        tokio::time::sleep(std::time::Duration::from_millis(duration_ms)).await;
        BlockResult::ok(format!("slept {duration_ms}ms"))
    }
}
