//! Campaign linkage scenario: two scripts, the first succeeds, the
//! second fails, `continue_on_failure=true`. Exercises the real
//! find-and-link path against an `InMemoryStore`, using `/bin/true` and
//! `/bin/false` as stand-ins for harness-produced script binaries so the
//! test observes real process exit codes rather than a mocked runner.

use chrono::Utc;
use vpt_core::model::{
    CampaignPolicy, CampaignStatus, DeviceId, HostName, ScriptConfiguration, ScriptResultId, TeamId,
};
use vpt_harness::campaign::CampaignExecutor;
use vpt_store::{ScriptResultRecord, Store};
use vpt_store::memory::InMemoryStore;

fn campaign_config(scripts: Vec<ScriptConfiguration>) -> vpt_core::model::CampaignConfiguration {
    vpt_core::model::CampaignConfiguration {
        campaign_name: "two-script-campaign".into(),
        userinterface_name: "horizon".into(),
        host_name: HostName::new("host1"),
        device_name: DeviceId::new("dev1"),
        policy: CampaignPolicy {
            continue_on_failure: true,
            timeout_minutes: 1,
            parallel: false,
        },
        scripts,
    }
}

async fn seed_script_result(store: &InMemoryStore, team_id: &TeamId, script_name: &str, success: bool) {
    store
        .record_script_result(ScriptResultRecord {
            id: ScriptResultId::new_uuid(),
            team_id: team_id.clone(),
            script_name: script_name.to_string(),
            host_name: HostName::new("host1"),
            device_name: DeviceId::new("dev1"),
            success,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            report: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn campaign_with_a_failing_script_links_both_results_and_reports_failed() {
    if !std::path::Path::new("/bin/true").exists() || !std::path::Path::new("/bin/false").exists() {
        eprintln!("skipping: /bin/true or /bin/false not present on this system");
        return;
    }

    let store = InMemoryStore::new();
    let team_id = TeamId::new("team1");
    seed_script_result(&store, &team_id, "true", true).await;
    seed_script_result(&store, &team_id, "false", false).await;

    let executor = CampaignExecutor::new("/bin");
    let scripts = vec![
        ScriptConfiguration {
            script_name: "true".into(),
            script_type: "generic".into(),
            parameters: Default::default(),
        },
        ScriptConfiguration {
            script_name: "false".into(),
            script_type: "generic".into(),
            parameters: Default::default(),
        },
    ];

    let result = executor
        .execute_campaign(&store, &team_id, campaign_config(scripts), None)
        .await;

    assert!(!result.success);
    assert_eq!(result.successful_scripts, 1);
    assert_eq!(result.failed_scripts, 1);
    assert_eq!(result.script_executions.len(), 2);
    assert!(result.script_executions[0].success);
    assert!(!result.script_executions[1].success);

    let campaign_execution = executor
        .get_campaign_execution(&store, &result.campaign_execution_id)
        .await
        .unwrap()
        .expect("campaign execution must be recorded");
    assert_eq!(campaign_execution.script_result_ids.len(), 2);
    assert_eq!(campaign_execution.status, CampaignStatus::Failed);
    assert_eq!(campaign_execution.successful_scripts, 1);
    assert_eq!(campaign_execution.failed_scripts, 1);
}
