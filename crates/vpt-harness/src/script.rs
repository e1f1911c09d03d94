//! Script execution harness: the scaffolding every user script runs
//! through before its own `main` sees a device. Grounded on the
//! decorator-based framework the scripts were originally written
//! against — `@script(name, description)` parsed a declared argument
//! list, built a context, and guaranteed cleanup in a `finally` block
//! regardless of how `main` exited. Rust has no decorators, so the same
//! contract becomes a `run_script` entry point that takes the user's
//! closure and performs the setup/teardown around it.

use std::collections::HashMap;

use vpt_controller::ControllerRegistry;
use vpt_core::config::HostConfig;
use vpt_core::model::{DeviceId, ExecutionContext, HostName, TeamId};
use vpt_core::{Error, Result};
use vpt_exec::locks::{DeviceLockCoordinator, LockOutcome};
use vpt_exec::screenshots;
use vpt_graph::NavigationGraphCache;
use vpt_store::{ScriptResultRecord, Store};

use crate::report;

/// One `"--name:type:default"` entry from a script's declared argument
/// list, e.g. `"--dns:str:google.com"` or `"--max_iteration:int:5"`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    Int,
    Str,
    Bool,
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub arg_type: ArgType,
    pub default: String,
}

impl ArgSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::validation(format!(
                "malformed script argument spec: {spec}"
            )));
        }
        let arg_type = match parts[1] {
            "int" => ArgType::Int,
            "str" => ArgType::Str,
            "bool" => ArgType::Bool,
            other => {
                return Err(Error::validation(format!(
                    "unknown script argument type: {other}"
                )))
            }
        };
        Ok(Self {
            name: parts[0].trim_start_matches("--").to_string(),
            arg_type,
            default: parts[2].to_string(),
        })
    }
}

/// Parses `raw_args` against the script's declared arguments plus the
/// framework-standard ones (`userinterface_name` positional, `--host`,
/// `--device` optional), filling in declared defaults for anything not
/// passed. Arguments that match neither the declared list nor the
/// framework-standard ones are logged and otherwise ignored, matching
/// the original parser's `parse_known_args` tolerance rather than
/// rejecting the whole invocation over one stray flag.
pub fn parse_script_args(
    _script_name: &str,
    declared: &[&str],
    raw_args: &[String],
) -> Result<HashMap<String, serde_json::Value>> {
    let specs: Result<Vec<ArgSpec>> = declared.iter().map(|s| ArgSpec::parse(s)).collect();
    let specs = specs?;

    let mut params: HashMap<String, serde_json::Value> = HashMap::new();
    for spec in &specs {
        let default = match spec.arg_type {
            ArgType::Int => serde_json::json!(spec.default.parse::<i64>().unwrap_or(0)),
            ArgType::Str => serde_json::json!(spec.default),
            ArgType::Bool => serde_json::json!(matches_truthy(&spec.default)),
        };
        params.insert(spec.name.clone(), default);
    }

    let known_flags: HashMap<&str, &ArgSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut positional_slot = Some("userinterface_name");
    let mut ignored = Vec::new();

    let mut iter = raw_args.iter().peekable();
    while let Some(raw) = iter.next() {
        if let Some(name) = raw.strip_prefix("--") {
            if name == "host" || name == "device" {
                if let Some(value) = iter.next() {
                    params.insert(name.to_string(), serde_json::json!(value));
                }
                continue;
            }
            if let Some(spec) = known_flags.get(name) {
                match spec.arg_type {
                    ArgType::Bool => {
                        params.insert(name.to_string(), serde_json::json!(true));
                    }
                    _ => {
                        if let Some(value) = iter.next() {
                            let parsed = match spec.arg_type {
                                ArgType::Int => serde_json::json!(value.parse::<i64>().unwrap_or(0)),
                                ArgType::Str => serde_json::json!(value),
                                ArgType::Bool => unreachable!(),
                            };
                            params.insert(name.to_string(), parsed);
                        }
                    }
                }
                continue;
            }
            ignored.push(raw.clone());
            if !matches!(iter.peek(), Some(next) if next.starts_with("--")) {
                iter.next();
            }
        } else if let Some(slot) = positional_slot.take() {
            params.insert(slot.to_string(), serde_json::json!(raw));
        } else {
            ignored.push(raw.clone());
        }
    }

    if !ignored.is_empty() {
        tracing::debug!(?ignored, "ignoring unrecognized script arguments");
    }

    Ok(params)
}

fn matches_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "t" | "yes" | "y" | "1")
}

/// Process exit codes the harness guarantees.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

pub struct ScriptOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Runs `body` with a fully set up execution context: host config
/// loaded, device selected, device lock acquired, navigation tree cached
/// if a userinterface was requested. `body` receives the context by
/// mutable reference rather than by value so the harness can still see
/// its accumulated `step_results`/`screenshot_paths` once `body` returns
/// and fold them into a report, rather than trusting the script to hand
/// one back itself. Regardless of how `body` returns, captures a closing
/// screenshot, releases the lock, generates the report, and records a
/// script result before returning the process exit code — mirroring the
/// original decorator's try/except/finally shape without relying on
/// panics for control flow.
#[allow(clippy::too_many_arguments)]
pub async fn run_script<F, Fut>(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    graph_cache: &NavigationGraphCache,
    locks: &DeviceLockCoordinator,
    script_name: &str,
    team_id: TeamId,
    device_id: DeviceId,
    userinterface_name: Option<&str>,
    body: F,
) -> i32
where
    F: FnOnce(&mut ExecutionContext) -> Fut,
    Fut: std::future::Future<Output = ScriptOutcome>,
{
    let host_config = match HostConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "script environment setup failed");
            return EXIT_FAILURE;
        }
    };

    let host_name = HostName::new(host_config.host_name.as_str());
    let device_key = vpt_core::model::DeviceKey::new(&host_name, &device_id);
    let session_id = vpt_core::model::SessionId::new_uuid();
    if !matches!(
        locks.lock_device(device_key.clone(), session_id.clone()),
        LockOutcome::Acquired | LockOutcome::AlreadyOwned
    ) {
        tracing::error!(device = %device_key, "device is already locked");
        return EXIT_FAILURE;
    }

    let started_at = chrono::Utc::now();
    let mut context = ExecutionContext::new(host_name.clone(), device_id.clone(), team_id.clone());
    context.script_context = script_name.to_string();

    if let Some(ui_name) = userinterface_name {
        match graph_cache.get_or_load(store, ui_name, &team_id).await {
            Ok(tree) => {
                context.tree_id = Some(tree.tree_id.clone());
                context.userinterface_name = Some(tree.userinterface_name.clone());
            }
            Err(e) => {
                locks.unlock_device(&device_key, &session_id);
                tracing::error!(error = %e, "failed to load navigation tree for script");
                return EXIT_FAILURE;
            }
        }
    }

    if let Some(path) = screenshots::capture(controllers, &context.device_model, "script_start").await {
        context.screenshot_paths.push(path);
    }

    let outcome = body(&mut context).await;

    if let Some(path) = screenshots::capture(controllers, &context.device_model, "script_end").await {
        context.screenshot_paths.push(path);
    }

    locks.unlock_device(&device_key, &session_id);

    let report = report::generate(&context);

    let record = ScriptResultRecord {
        id: vpt_core::model::ScriptResultId::new_uuid(),
        team_id,
        script_name: script_name.to_string(),
        host_name,
        device_name: device_id,
        success: outcome.success,
        started_at,
        completed_at: chrono::Utc::now(),
        report: Some(report),
    };
    if let Err(e) = store.record_script_result(record).await {
        tracing::error!(error = %e, "failed to record script result");
    }

    if outcome.success {
        EXIT_SUCCESS
    } else {
        tracing::error!(error = ?outcome.error, "script failed");
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_arg_spec() {
        let spec = ArgSpec::parse("--max_iteration:int:5").unwrap();
        assert_eq!(spec.name, "max_iteration");
        assert_eq!(spec.arg_type, ArgType::Int);
        assert_eq!(spec.default, "5");
    }

    #[test]
    fn rejects_malformed_spec() {
        assert!(ArgSpec::parse("--broken").is_err());
    }

    #[test]
    fn declared_args_fall_back_to_their_defaults() {
        let params = parse_script_args("dns_lookuptime", &["--dns:str:google.com"], &[]).unwrap();
        assert_eq!(params["dns"], serde_json::json!("google.com"));
    }

    #[test]
    fn declared_args_parse_overrides() {
        let raw = vec!["--dns".to_string(), "example.com".to_string()];
        let params = parse_script_args("dns_lookuptime", &["--dns:str:google.com"], &raw).unwrap();
        assert_eq!(params["dns"], serde_json::json!("example.com"));
    }

    #[test]
    fn unknown_arguments_are_ignored_not_rejected() {
        let raw = vec!["--not-a-real-flag".to_string(), "value".to_string()];
        assert!(parse_script_args("dns_lookuptime", &["--dns:str:google.com"], &raw).is_ok());
    }
}
