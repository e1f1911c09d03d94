use async_trait::async_trait;
use vpt_core::model::ExecutionContext;

use crate::registry::{Block, BlockInfo, BlockParamInfo, BlockResult};

/// Evaluates a minimal `field OP value` expression against the execution
/// context's `custom_data` bag. Supported operators: `==`, `!=`, `>`, `<`.
pub struct EvaluateConditionBlock;

#[async_trait]
impl Block for EvaluateConditionBlock {
    fn info(&self) -> BlockInfo {
        BlockInfo {
            command: "evaluate_condition".into(),
            description: "evaluates a field comparison against custom_data".into(),
            params: vec![BlockParamInfo {
                name: "expression".into(),
                param_type: "str".into(),
                required: true,
                default: None,
            }],
        }
    }

    async fn execute(&self, context: &ExecutionContext, params: &serde_json::Value) -> BlockResult {
        let Some(expression) = params.get("expression").and_then(|v| v.as_str()) else {
            return BlockResult::fail("missing required param: expression");
        };
        match evaluate(expression, &context.custom_data) {
            Some(true) => {
                let mut result = BlockResult::ok("condition true");
                result.data = serde_json::json!({ "matched": true });
                result
            }
            Some(false) => {
                let mut result = BlockResult::ok("condition false");
                result.data = serde_json::json!({ "matched": false });
                result
            }
            None => BlockResult::fail(format!("could not evaluate expression: {expression}")),
        }
    }
}

fn evaluate(
    expression: &str,
    custom_data: &std::collections::HashMap<String, serde_json::Value>,
) -> Option<bool> {
    for op in ["==", "!=", ">", "<"] {
        if let Some((field, value)) = expression.split_once(op) {
            let field = field.trim();
            let value = value.trim().trim_matches('"');
            let actual = custom_data.get(field)?;
            return Some(compare(actual, value, op));
        }
    }
    None
}

fn compare(actual: &serde_json::Value, expected: &str, op: &str) -> bool {
    let actual_str = match actual {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match op {
        "==" => actual_str == expected,
        "!=" => actual_str != expected,
        ">" => match (actual.as_f64(), expected.parse::<f64>()) {
            (Some(a), Ok(b)) => a > b,
            _ => false,
        },
        "<" => match (actual.as_f64(), expected.parse::<f64>()) {
            (Some(a), Ok(b)) => a < b,
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::{DeviceId, HostName, TeamId};

    fn ctx_with(key: &str, value: serde_json::Value) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(HostName::new("h"), DeviceId::new("d"), TeamId::new("t"));
        ctx.custom_data.insert(key.to_string(), value);
        ctx
    }

    #[tokio::test]
    async fn equality_condition_matches() {
        let block = EvaluateConditionBlock;
        let ctx = ctx_with("status", serde_json::json!("ready"));
        let result = block
            .execute(&ctx, &serde_json::json!({"expression": "status == ready"}))
            .await;
        assert!(result.success);
        assert_eq!(result.data["matched"], true);
    }

    #[tokio::test]
    async fn numeric_greater_than_condition() {
        let block = EvaluateConditionBlock;
        let ctx = ctx_with("retries", serde_json::json!(3));
        let result = block
            .execute(&ctx, &serde_json::json!({"expression": "retries > 1"}))
            .await;
        assert_eq!(result.data["matched"], true);
    }
}
