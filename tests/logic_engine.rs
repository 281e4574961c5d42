//! Rule-engine behavior: event routing, modifier passing, branch
//! selection and the first-matching-chain reply contract.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mesh_agent::logic::{Action, ActionNode, ActionRegistry, Manifest, ManifestEvent};
use mesh_agent::{Agent, AgentConfig, AgentContext, AgentError};
use mesh_agent::events::{ActionCtx, EventParams, EventType};

/// Records its invocations and reports the outcome its modifier asks for:
/// `ok` → true, `no` → false, `err` → error. The modifier also lands in
/// the chain context so sync posters can observe it.
struct Scripted {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Action for Scripted {
    async fn perform(
        &self,
        _cx: &AgentContext,
        ctx: &mut ActionCtx,
        modifier: &str,
        _params: &EventParams,
    ) -> Result<bool, AgentError> {
        self.log.lock().unwrap().push(modifier.to_string());
        ctx.proxy_id = Some(modifier.to_string());
        match modifier.split(':').next().unwrap_or_default() {
            "no" => Ok(false),
            "err" => Err(AgentError::Other("scripted failure".into())),
            _ => Ok(true),
        }
    }
}

fn scripted_registry() -> (ActionRegistry, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut actions = ActionRegistry::new();
    actions.register("scripted", Arc::new(Scripted { log: Arc::clone(&log) }));
    (actions, log)
}

fn start(manifest_text: &str) -> (Arc<AgentContext>, Arc<Mutex<Vec<String>>>, CancellationToken) {
    let (actions, log) = scripted_registry();
    let manifest = Manifest::parse(manifest_text, &actions).unwrap();
    let root = CancellationToken::new();
    let cfg = AgentConfig {
        event_timeout: Duration::from_secs(5),
        ..AgentConfig::default()
    };
    let cx = Agent::start_with_manifest(cfg, root.clone(), manifest, actions).unwrap();
    (cx, log, root)
}

#[tokio::test]
async fn every_event_routes_to_its_chain() {
    let manifest = EventType::ALL
        .iter()
        .enumerate()
        .fold("logic:\n".to_string(), |acc, (i, t)| {
            acc + &format!("  {}:\n    scripted(ok:{i}):\n", t.name())
        });
    let (cx, _log, root) = start(&manifest);

    for (i, event_type) in EventType::ALL.iter().enumerate() {
        let ctx = cx.bus.post_sync(*event_type, EventParams::default()).await.unwrap();
        assert_eq!(ctx.proxy_id.as_deref(), Some(format!("ok:{i}").as_str()));
    }
    root.cancel();
}

#[tokio::test]
async fn branches_follow_the_action_outcome() {
    let manifest = r#"
logic:
  on-register-proxy:
    scripted(ok:root):
      success:
        scripted(no:gate):
          true:
            scripted(ok:untaken):
          false:
            scripted(err:fallback):
              error:
                scripted(ok:recovered):
"#;
    let (cx, log, root) = start(manifest);

    let ctx = cx
        .bus
        .post_sync(EventType::OnRegisterProxy, EventParams::default())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["ok:root", "no:gate", "err:fallback", "ok:recovered"]
    );
    // The final context reflects the last action that ran.
    assert_eq!(ctx.proxy_id.as_deref(), Some("ok:recovered"));
    root.cancel();
}

#[tokio::test]
async fn siblings_run_after_a_branch_completes() {
    let manifest = r#"
logic:
  on-register-proxy:
    scripted(ok:first):
      success:
        scripted(ok:nested):
    scripted(ok:second):
"#;
    let (cx, log, root) = start(manifest);

    cx.bus
        .post_sync(EventType::OnRegisterProxy, EventParams::default())
        .await
        .unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["ok:first", "ok:nested", "ok:second"]);
    root.cancel();
}

#[tokio::test]
async fn first_matching_entry_supplies_the_sync_reply() {
    let (actions, log) = scripted_registry();
    // Two entries for one event; only composable programmatically since
    // YAML mappings cannot repeat keys.
    let node = |modifier: &str| ActionNode {
        name: "scripted".into(),
        modifier: modifier.into(),
        on_true: Vec::new(),
        on_false: Vec::new(),
    };
    let manifest = Manifest {
        events: vec![
            ManifestEvent {
                event_type: EventType::OnRegisterProxy,
                actions: vec![node("ok:first-entry")],
            },
            ManifestEvent {
                event_type: EventType::OnRegisterProxy,
                actions: vec![node("ok:second-entry")],
            },
        ],
    };

    let root = CancellationToken::new();
    let cx = Agent::start_with_manifest(
        AgentConfig::default(),
        root.clone(),
        manifest,
        actions,
    )
    .unwrap();

    let ctx = cx
        .bus
        .post_sync(EventType::OnRegisterProxy, EventParams::default())
        .await
        .unwrap();

    // Both entries ran, each from a fresh context; the reply carries the
    // first entry's outcome.
    assert_eq!(*log.lock().unwrap(), vec!["ok:first-entry", "ok:second-entry"]);
    assert_eq!(ctx.proxy_id.as_deref(), Some("ok:first-entry"));
    root.cancel();
}

#[tokio::test]
async fn unrouted_events_reply_with_an_empty_context() {
    let (cx, log, root) = start("logic:\n  on-register-proxy:\n    scripted(ok):\n");
    let ctx = cx
        .bus
        .post_sync(EventType::OnProxyDisconnected, EventParams::default())
        .await
        .unwrap();
    assert!(ctx.proxy_id.is_none());
    assert!(log.lock().unwrap().is_empty());
    root.cancel();
}
