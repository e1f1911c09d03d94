use async_trait::async_trait;
use vpt_core::model::ExecutionContext;

use crate::registry::{Block, BlockInfo, BlockParamInfo, BlockResult};

/// Reads a named field out of the execution context's `custom_data` bag,
/// the way the original block reports menu state populated by an earlier
/// step in the same run.
pub struct GetMenuInfoBlock;

#[async_trait]
impl Block for GetMenuInfoBlock {
    fn info(&self) -> BlockInfo {
        BlockInfo {
            command: "get_menu_info".into(),
            description: "reads cached menu state from the execution context".into(),
            params: vec![BlockParamInfo {
                name: "field".into(),
                param_type: "str".into(),
                required: false,
                default: Some(serde_json::json!("menu")),
            }],
        }
    }

    async fn execute(&self, context: &ExecutionContext, params: &serde_json::Value) -> BlockResult {
        let field = params
            .get("field")
            .and_then(|v| v.as_str())
            .unwrap_or("menu");
        match context.custom_data.get(field) {
            Some(value) => {
                let mut result = BlockResult::ok(format!("found {field}"));
                result.data = value.clone();
                result
            }
            None => BlockResult::fail(format!("no menu info recorded for field: {field}")),
        }
    }
}
