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
    finalizer,
};

/// Entrypoint for the `GameType` controller.
pub async fn run(client: Client) -> Result<(), Error> {
    println!("{}", "⚙️ Starting GameType controller...".green());

    let crd_api: Api<GameType> = Api::all(client.clone());
    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone()));

    Controller::new(crd_api, Default::default())
        .owns(Api::<Fleet>::all(client), Default::default())
        .with_config(Config::default().concurrency(10))
        .run(reconcile, on_error, context)
        .for_each(|_reconciliation_result| async move {})
        .await;
    Ok(())
}

/// Context injected with each `reconcile` and `on_error` method invocation.
pub(super) struct ContextData {
    pub(super) client: Client,

    pub(super) events: EventPublisher,
}

impl ContextData {
    pub fn new(client: Client) -> Self {
        ContextData {
            events: EventPublisher::new(client.clone()),
            client,
        }
    }
}

/// Action to be taken upon a `GameType` resource during reconciliation
#[derive(Debug, PartialEq)]
enum GameTypeAction {
    AddFinalizer,

    /// Delete child Fleets and release the finalizer once none remain.
    Finalize,

    /// No Fleet matches the label yet; create the first one.
    CreateInitialFleet,

    /// The active Fleet's pod template no longer matches the GameType's.
    /// A replacement Fleet is created; the old one is deleted on a later
    /// pass once two Fleets are observed.
    ReplaceFleet,

    /// Forward the desired replica count into the active Fleet.
    PatchReplicas { fleet_name: String, replicas: i32 },

    /// More than one Fleet observed; delete the oldest one not already
    /// being deleted until a single Fleet remains.
    DeleteOldestFleet,

    /// Record the active Fleet in the status.
    SyncStatus { fleet_name: String },

    /// The [`GameType`] resource is in desired state and requires no actions to be taken.
    NoOp,
}

impl GameTypeAction {
    fn to_str(&self) -> &str {
        match self {
            GameTypeAction::AddFinalizer => "AddFinalizer",
            GameTypeAction::Finalize => "Finalize",
            GameTypeAction::CreateInitialFleet => "CreateInitialFleet",
            GameTypeAction::ReplaceFleet => "ReplaceFleet",
            GameTypeAction::PatchReplicas { .. } => "PatchReplicas",
            GameTypeAction::DeleteOldestFleet => "DeleteOldestFleet",
            GameTypeAction::SyncStatus { .. } => "SyncStatus",
            GameTypeAction::NoOp => "NoOp",
        }
    }
}

/// Reconciliation function for the `GameType` resource. Scale-down moves
/// one Server per Fleet tick and one Fleet per GameType tick, so every
/// branch requeues.
async fn reconcile(instance: Arc<GameType>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client: Client = context.client.clone();

    let namespace: String = match instance.namespace() {
        None => {
            return Err(Error::UserInput(
                "Expected GameType resource to be namespaced. Can't deploy to an unknown namespace."
                    .to_owned(),
            ));
        }
        Some(namespace) => namespace,
    };

    let name = instance.name_any();

    let action = determine_action(client.clone(), &instance).await?;

    if action != GameTypeAction::NoOp {
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
        GameTypeAction::AddFinalizer => {
            actions::add_finalizer(&context, &instance).await?;

            Action::await_change()
        }
        GameTypeAction::Finalize => {
            let done = actions::finalize(&context, &instance).await?;
            if done {
                Action::await_change()
            } else {
                Action::requeue(SCALE_STEP_INTERVAL)
            }
        }
        GameTypeAction::CreateInitialFleet => {
            actions::create_initial_fleet(&context, &instance).await?;

            Action::await_change()
        }
        GameTypeAction::ReplaceFleet => {
            actions::replace_fleet(&context, &instance).await?;

            Action::requeue(SCALE_STEP_INTERVAL)
        }
        GameTypeAction::PatchReplicas {
            fleet_name,
            replicas,
        } => {
            actions::patch_fleet_replicas(&context, &instance, &fleet_name, replicas).await?;

            Action::requeue(SCALE_STEP_INTERVAL)
        }
        GameTypeAction::DeleteOldestFleet => {
            actions::delete_oldest_fleet(&context, &instance).await?;

            Action::requeue(SCALE_STEP_INTERVAL)
        }
        GameTypeAction::SyncStatus { fleet_name } => {
            actions::sync_status(&context, &instance, &fleet_name).await?;

            Action::requeue(PROBE_INTERVAL)
        }
        GameTypeAction::NoOp => Action::requeue(PROBE_INTERVAL),
    };

    Ok(result)
}

async fn determine_action(client: Client, instance: &GameType) -> Result<GameTypeAction, Error> {
    if instance.metadata.deletion_timestamp.is_some() {
        return Ok(GameTypeAction::Finalize);
    }

    if !finalizer::contains(instance, finalizers::GAME_TYPE) {
        return Ok(GameTypeAction::AddFinalizer);
    }

    let fleets = list_fleets(client, instance).await?;
    match fleets.len() {
        0 => Ok(GameTypeAction::CreateInitialFleet),
        1 => {
            let fleet = &fleets[0];
            if !are_fleet_pods_equal(&fleet.spec, &instance.spec.fleet) {
                return Ok(GameTypeAction::ReplaceFleet);
            }
            if fleet.spec.scaling.replicas != instance.spec.fleet.scaling.replicas {
                return Ok(GameTypeAction::PatchReplicas {
                    fleet_name: fleet.name_any(),
                    replicas: instance.spec.fleet.scaling.replicas,
                });
            }
            Ok(determine_status_action(instance, fleet))
        }
        _ => Ok(GameTypeAction::DeleteOldestFleet),
    }
}

fn determine_status_action(instance: &GameType, fleet: &Fleet) -> GameTypeAction {
    let fleet_name = fleet.name_any();
    let status = instance.status.as_ref();
    let drifted = status.is_none_or(|s| s.current_fleet.as_deref() != Some(fleet_name.as_str()));
    let stale = status
        .and_then(|s| s.last_updated.as_ref())
        .is_none_or(|t| {
            Timestamp::now().duration_since(t.0).as_secs() >= PROBE_INTERVAL.as_secs() as i64
        });
    if drifted || stale {
        GameTypeAction::SyncStatus { fleet_name }
    } else {
        GameTypeAction::NoOp
    }
}

/// Lists the Fleets labelled as belonging to this GameType.
pub(super) async fn list_fleets(client: Client, gametype: &GameType) -> Result<Vec<Fleet>, Error> {
    let namespace = gametype
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<Fleet> = Api::namespaced(client, &namespace);
    let params =
        ListParams::default().labels(&format!("{}={}", labels::GAME_TYPE, gametype.name_any()));
    let list = api.list(&params).await?;
    Ok(list.items)
}

/// Actions to be taken when a reconciliation fails - for whatever reason.
fn on_error(instance: Arc<GameType>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "GameType reconciliation error: {} ({}/{})",
            error,
            instance.namespace().unwrap_or_default(),
            instance.name_any()
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}
