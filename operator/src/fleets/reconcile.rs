use futures::stream::StreamExt;
use k8s_openapi::jiff::Timestamp;
use kube::{
    Api, ResourceExt,
    api::ListParams,
    client::Client,
    runtime::{
        Controller,
        controller::{Action, Config},
    },
};
use loputoo_types::*;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::time::Duration;

use super::actions;
use crate::util::{
    Error, PROBE_INTERVAL, SCALE_STEP_INTERVAL,
    colors::{FG1, FG2},
    events::EventPublisher,
    eviction::{EvictionProbe, SidecarEvictionProbe},
    finalizer,
};

/// Entrypoint for the `Fleet` controller.
pub async fn run(client: Client) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Fleet controller...".green());

    let crd_api: Api<Fleet> = Api::all(client.clone());
    let probe = Arc::new(SidecarEvictionProbe {
        client: client.clone(),
    });
    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone(), probe));

    Controller::new(crd_api, Default::default())
        .owns(Api::<Server>::all(client), Default::default())
        .with_config(Config::default().concurrency(10))
        .run(reconcile, on_error, context)
        .for_each(|_reconciliation_result| async move {})
        .await;
    Ok(())
}

/// Context injected with each `reconcile` and `on_error` method invocation.
pub(super) struct ContextData {
    pub(super) client: Client,

    /// Peeks at sidecar consent when picking a scale-down victim.
    pub(super) probe: Arc<dyn EvictionProbe>,

    pub(super) events: EventPublisher,
}

impl ContextData {
    pub fn new(client: Client, probe: Arc<dyn EvictionProbe>) -> Self {
        ContextData {
            events: EventPublisher::new(client.clone()),
            client,
            probe,
        }
    }
}

/// Action to be taken upon a `Fleet` resource during reconciliation
#[derive(Debug, PartialEq)]
enum FleetAction {
    AddFinalizer,

    /// Delete all child Servers, then release the Fleet finalizer.
    Finalize,

    /// Create this many Servers to reach the desired replica count.
    ScaleUp(i32),

    /// Remove one Server; repeated passes converge on the desired count.
    ScaleDown,

    /// Bring `status.current_replicas` in line with the observed count.
    SyncStatus(i32),

    /// The [`Fleet`] resource is in desired state and requires no actions to be taken.
    NoOp,
}

impl FleetAction {
    fn to_str(&self) -> &str {
        match self {
            FleetAction::AddFinalizer => "AddFinalizer",
            FleetAction::Finalize => "Finalize",
            FleetAction::ScaleUp(_) => "ScaleUp",
            FleetAction::ScaleDown => "ScaleDown",
            FleetAction::SyncStatus(_) => "SyncStatus",
            FleetAction::NoOp => "NoOp",
        }
    }
}

/// Reconciliation function for the `Fleet` resource. A Fleet is never
/// "done": every branch requeues so drift is caught even without events.
async fn reconcile(instance: Arc<Fleet>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client: Client = context.client.clone();

    let namespace: String = match instance.namespace() {
        None => {
            return Err(Error::UserInput(
                "Expected Fleet resource to be namespaced. Can't deploy to an unknown namespace."
                    .to_owned(),
            ));
        }
        Some(namespace) => namespace,
    };

    let name = instance.name_any();

    let action = determine_action(client.clone(), &instance).await?;

    if action != FleetAction::NoOp {
        println!(
            "🔧 {}{}{}{}{}",
            namespace.color(FG2),
            "/".color(FG1),
            name.color(FG2),
            " ACTION: ".color(FG1),
            action.to_str().color(FG2),
        );
    }

    let result = match action {
        FleetAction::AddFinalizer => {
            actions::add_finalizer(&context, &instance).await?;

            Action::await_change()
        }
        FleetAction::Finalize => {
            let done = actions::finalize(&context, &instance).await?;
            if done {
                Action::await_change()
            } else {
                // Children are still draining; check again shortly.
                Action::requeue(SCALE_STEP_INTERVAL)
            }
        }
        FleetAction::ScaleUp(count) => {
            actions::scale_up(&context, &instance, count).await?;

            Action::requeue(SCALE_STEP_INTERVAL)
        }
        FleetAction::ScaleDown => {
            actions::scale_down(&context, &instance).await?;

            Action::requeue(SCALE_STEP_INTERVAL)
        }
        FleetAction::SyncStatus(current) => {
            actions::sync_status(&context, &instance, current).await?;

            Action::requeue(PROBE_INTERVAL)
        }
        FleetAction::NoOp => Action::requeue(PROBE_INTERVAL),
    };

    Ok(result)
}

async fn determine_action(client: Client, instance: &Fleet) -> Result<FleetAction, Error> {
    if instance.metadata.deletion_timestamp.is_some() {
        return Ok(FleetAction::Finalize);
    }

    if !finalizer::contains(instance, finalizers::FLEET) {
        return Ok(FleetAction::AddFinalizer);
    }

    let servers = list_servers(client, instance).await?;
    let current = servers.len() as i32;
    let desired = instance.spec.scaling.replicas;

    if desired > current {
        return Ok(FleetAction::ScaleUp(desired - current));
    }
    if desired < current {
        return Ok(FleetAction::ScaleDown);
    }

    Ok(determine_status_action(instance, current))
}

fn determine_status_action(instance: &Fleet, current: i32) -> FleetAction {
    let status = instance.status.as_ref();
    let drifted = status.is_none_or(|s| s.current_replicas != current);
    let stale = status
        .and_then(|s| s.last_updated.as_ref())
        .is_none_or(|t| {
            Timestamp::now().duration_since(t.0).as_secs() >= PROBE_INTERVAL.as_secs() as i64
        });
    if drifted || stale {
        FleetAction::SyncStatus(current)
    } else {
        FleetAction::NoOp
    }
}

/// Lists the Servers labelled as children of this Fleet.
pub(super) async fn list_servers(client: Client, fleet: &Fleet) -> Result<Vec<Server>, Error> {
    let namespace = fleet
        .namespace()
        .ok_or_else(|| Error::UserInput("Fleet is missing metadata.namespace".to_string()))?;
    let api: Api<Server> = Api::namespaced(client, &namespace);
    let params =
        ListParams::default().labels(&format!("{}={}", labels::FLEET, fleet.name_any()));
    let list = api.list(&params).await?;
    Ok(list.items)
}

/// Actions to be taken when a reconciliation fails - for whatever reason.
fn on_error(instance: Arc<Fleet>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "Fleet reconciliation error: {} ({}/{})",
            error,
            instance.namespace().unwrap_or_default(),
            instance.name_any()
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}
