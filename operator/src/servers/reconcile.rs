use futures::stream::StreamExt;
use k8s_openapi::{api::core::v1::Pod, jiff::Timestamp};
use kube::{
    Api, ResourceExt,
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
    Error, PROBE_INTERVAL,
    colors::{FG1, FG2},
    events::EventPublisher,
    finalizer,
    gate::{DeletionGate, SidecarDeletionGate},
};

/// Pod template knobs resolved once at startup from the CLI.
#[derive(Clone)]
pub struct PodConfig {
    pub sidecar_image: String,
    pub image_pull_secret: Option<String>,
}

/// Entrypoint for the `Server` controller.
pub async fn run(client: Client, pods: PodConfig) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Server controller...".green());

    // Preparation of resources used by the `kube_runtime::Controller`
    let crd_api: Api<Server> = Api::all(client.clone());
    let context: Arc<ContextData> = Arc::new(ContextData::new(
        client.clone(),
        pods,
        Arc::new(SidecarDeletionGate),
    ));

    // The controller comes from the `kube_runtime` crate and manages the reconciliation process.
    // It requires the following information:
    // - `kube::Api<T>` this controller "owns". In this case, `T = Server`,
    // - a watcher config to select the `Server` resources with,
    // - `reconcile` function with reconciliation logic to be called each time a resource of `Server` kind is created/updated/deleted,
    // - `on_error` function to call whenever reconciliation fails.
    Controller::new(crd_api, Default::default())
        .owns(Api::<Pod>::all(client), Default::default())
        .with_config(Config::default().concurrency(10))
        .run(reconcile, on_error, context)
        .for_each(|_reconciliation_result| async move {})
        .await;
    Ok(())
}

/// Context injected with each `reconcile` and `on_error` method invocation.
pub(super) struct ContextData {
    /// Kubernetes client to make Kubernetes API requests with. Required for K8S resource management.
    pub(super) client: Client,

    pub(super) pods: PodConfig,

    /// Answers the deletion-consent question for a (Server, Pod) pair.
    pub(super) gate: Arc<dyn DeletionGate>,

    pub(super) events: EventPublisher,
}

impl ContextData {
    pub fn new(client: Client, pods: PodConfig, gate: Arc<dyn DeletionGate>) -> Self {
        ContextData {
            events: EventPublisher::new(client.clone()),
            client,
            pods,
            gate,
        }
    }
}

/// Action to be taken upon a `Server` resource during reconciliation
#[derive(Debug, PartialEq)]
enum ServerAction {
    /// Record the Server finalizer so deletion blocks on consent.
    AddFinalizer,

    /// The Server has a deletion timestamp; negotiate with the sidecar and
    /// release the finalizers once deletion is allowed.
    Finalize,

    /// Create the Server's Pod with the injected sidecar.
    CreatePod,

    /// The Pod exists but does not carry the finalizer yet.
    AddPodFinalizer,

    /// Refresh the status conditions.
    UpdateStatus,

    /// The [`Server`] resource is in desired state and requires no actions to be taken.
    NoOp,
}

impl ServerAction {
    fn to_str(&self) -> &str {
        match self {
            ServerAction::AddFinalizer => "AddFinalizer",
            ServerAction::Finalize => "Finalize",
            ServerAction::CreatePod => "CreatePod",
            ServerAction::AddPodFinalizer => "AddPodFinalizer",
            ServerAction::UpdateStatus => "UpdateStatus",
            ServerAction::NoOp => "NoOp",
        }
    }
}

/// Reconciliation function for the `Server` resource.
async fn reconcile(instance: Arc<Server>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client: Client = context.client.clone();

    // The resource of `Server` kind is required to have a namespace set. However, it is not guaranteed
    // the resource will have a `namespace` set. Therefore, the `namespace` field on object's metadata
    // is optional and Rust forces the programmer to check for it's existence first.
    let namespace: String = match instance.namespace() {
        None => {
            return Err(Error::UserInput(
                "Expected Server resource to be namespaced. Can't deploy to an unknown namespace."
                    .to_owned(),
            ));
        }
        Some(namespace) => namespace,
    };

    let name = instance.name_any();

    // Read phase of reconciliation determines goal during the write phase.
    let action = determine_action(client.clone(), &namespace, &instance).await?;

    if action != ServerAction::NoOp {
        println!(
            "🔧 {}{}{}{}{}",
            namespace.color(FG2),
            "/".color(FG1),
            name.color(FG2),
            " ACTION: ".color(FG1),
            action.to_str().color(FG2),
        );
    }

    // Performs action as decided by the `determine_action` function.
    // This is the write phase of reconciliation.
    let result = match action {
        ServerAction::AddFinalizer => {
            actions::add_finalizer(&context, &instance).await?;

            Action::await_change()
        }
        ServerAction::Finalize => {
            actions::finalize(&context, &instance, &namespace).await?;

            Action::await_change()
        }
        ServerAction::CreatePod => {
            actions::create_pod(&context, &instance, &namespace).await?;

            // Return early so the watch delivers the new Pod.
            Action::await_change()
        }
        ServerAction::AddPodFinalizer => {
            actions::ensure_pod_finalizer(&context, &instance, &namespace).await?;

            Action::await_change()
        }
        ServerAction::UpdateStatus => {
            actions::refresh_status(client, &instance).await?;

            Action::requeue(PROBE_INTERVAL)
        }
        // The resource is already in desired state, re-check on the probe interval.
        ServerAction::NoOp => Action::requeue(PROBE_INTERVAL),
    };

    Ok(result)
}

/// Resources arrive into the reconciliation queue in a certain state. This
/// function looks at the state of the given `Server` and decides which
/// action needs to be performed. The finite set of possible actions is
/// represented by the `ServerAction` enum.
async fn determine_action(
    client: Client,
    namespace: &str,
    instance: &Server,
) -> Result<ServerAction, Error> {
    if instance.metadata.deletion_timestamp.is_some() {
        return Ok(ServerAction::Finalize);
    }

    if !finalizer::contains(instance, finalizers::SERVER) {
        return Ok(ServerAction::AddFinalizer);
    }

    let pod = match get_pod(client, namespace, &instance.pod_name()).await? {
        Some(pod) => pod,
        None => return Ok(ServerAction::CreatePod),
    };

    if !finalizer::contains(&pod, finalizers::SERVER) {
        return Ok(ServerAction::AddPodFinalizer);
    }

    Ok(determine_status_action(instance))
}

/// Determines the action given that the only thing left to do is
/// periodically keeping the status conditions up-to-date.
fn determine_status_action(instance: &Server) -> ServerAction {
    let stale = instance
        .status
        .as_ref()
        .and_then(|status| status.last_updated.as_ref())
        .is_none_or(|t| {
            Timestamp::now().duration_since(t.0).as_secs() >= PROBE_INTERVAL.as_secs() as i64
        });
    if stale {
        ServerAction::UpdateStatus
    } else {
        ServerAction::NoOp
    }
}

async fn get_pod(client: Client, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    match api.get(name).await {
        Ok(pod) => Ok(Some(pod)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Actions to be taken when a reconciliation fails - for whatever reason.
/// Prints out the error to `stderr` and requeues the resource for another reconciliation after
/// five seconds. Consent refusals land here too; the retry is what turns
/// the sidecar's eventual "allowed" into an actual deletion.
fn on_error(instance: Arc<Server>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "Server reconciliation error: {} ({}/{})",
            error,
            instance.namespace().unwrap_or_default(),
            instance.name_any()
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}
