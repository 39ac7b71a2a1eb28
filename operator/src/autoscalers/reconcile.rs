use futures::stream::StreamExt;
use kube::{
    Api, ResourceExt,
    client::Client,
    runtime::{
        Controller,
        controller::{Action, Config},
        events::EventType,
    },
};
use loputoo_types::*;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::time::Duration;

use super::actions;
use crate::util::{
    Error,
    colors::{FG1, FG2},
    events::{EventPublisher, EventReason},
    scalewebhook::{HttpScaleWebhook, ScaleWebhook},
};

/// Requeue delay after a failed webhook call.
const WEBHOOK_ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Entrypoint for the `GameAutoscaler` controller.
pub async fn run(client: Client) -> Result<(), Error> {
    println!("{}", "⚙️ Starting GameAutoscaler controller...".green());

    let crd_api: Api<GameAutoscaler> = Api::all(client.clone());
    let context: Arc<ContextData> =
        Arc::new(ContextData::new(client.clone(), Arc::new(HttpScaleWebhook)));

    // A single worker: the same autoscaler is never invoked concurrently
    // with itself, and distinct autoscalers are independent anyway.
    Controller::new(crd_api, Default::default())
        .with_config(Config::default().concurrency(1))
        .run(reconcile, on_error, context)
        .for_each(|_reconciliation_result| async move {})
        .await;
    Ok(())
}

/// Context injected with each `reconcile` and `on_error` method invocation.
pub(super) struct ContextData {
    pub(super) client: Client,

    /// Outbound call to the scaling decision endpoint.
    pub(super) webhook: Arc<dyn ScaleWebhook>,

    pub(super) events: EventPublisher,
}

impl ContextData {
    pub fn new(client: Client, webhook: Arc<dyn ScaleWebhook>) -> Self {
        ContextData {
            events: EventPublisher::new(client.clone()),
            client,
            webhook,
        }
    }
}

/// Reconciliation function for the `GameAutoscaler` resource. Unlike the
/// other controllers this one is its own clock: every pass ends with a
/// "requeue after interval", which is what makes the webhook periodic.
async fn reconcile(
    instance: Arc<GameAutoscaler>,
    context: Arc<ContextData>,
) -> Result<Action, Error> {
    let client: Client = context.client.clone();

    let namespace: String = match instance.namespace() {
        None => {
            return Err(Error::UserInput(
                "Expected GameAutoscaler resource to be namespaced.".to_owned(),
            ));
        }
        Some(namespace) => namespace,
    };

    let name = instance.name_any();

    // The target must exist before anything else is worth doing.
    let gametypes: Api<GameType> = Api::namespaced(client.clone(), &namespace);
    let gametype = match gametypes.get(&instance.spec.game_name).await {
        Ok(gametype) => gametype,
        Err(e) => {
            context
                .events
                .publish(
                    instance.as_ref(),
                    EventType::Warning,
                    EventReason::GameAutoscalerInvalidServer,
                    "Failed to find the gametype",
                )
                .await;
            return Err(e.into());
        }
    };

    // Unsupported policy kinds are reported once and not retried; the
    // object has to change before another attempt makes sense.
    if instance.spec.policy.kind != policy_kind::WEBHOOK {
        context
            .events
            .publish(
                instance.as_ref(),
                EventType::Warning,
                EventReason::GameautoscalerInvalidAutoscalePolicy,
                "invalid game autoscaler policy type",
            )
            .await;
        eprintln!(
            "{}",
            format!("{} is not a valid policy type", instance.spec.policy.kind).red()
        );
        return Ok(Action::await_change());
    }

    let result = match context
        .webhook
        .send_scale_request(&instance, &gametype)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            context
                .events
                .publish(
                    instance.as_ref(),
                    EventType::Warning,
                    EventReason::GameautoscalerWebhook,
                    format!("failed to send the webhook request: {}", e),
                )
                .await;
            eprintln!(
                "{}",
                format!("Failed to send scale webhook request: {}", e).red()
            );
            return Ok(Action::requeue(WEBHOOK_ERROR_BACKOFF));
        }
    };

    if instance.spec.sync.kind != sync_kind::FIXED_INTERVAL {
        context
            .events
            .publish(
                instance.as_ref(),
                EventType::Warning,
                EventReason::GameautoscalerInvalidSyncType,
                format!("{} is not a valid sync type", instance.spec.sync.kind),
            )
            .await;
        return Ok(Action::await_change());
    }

    let interval = parse_duration::parse(&instance.spec.sync.interval)?;

    // No scaling requested; come back on the next tick.
    if !result.scale {
        return Ok(Action::requeue(interval));
    }

    actions::scale_gametype(&context, &instance, &gametype, result.desired_replicas).await?;

    println!(
        "📈 {}{}{}{}{}",
        namespace.color(FG2),
        "/".color(FG1),
        name.color(FG2),
        " SCALE: ".color(FG1),
        result.desired_replicas.color(FG2),
    );

    Ok(Action::requeue(interval))
}

/// Actions to be taken when a reconciliation fails - for whatever reason.
fn on_error(instance: Arc<GameAutoscaler>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "GameAutoscaler reconciliation error: {} ({}/{})",
            error,
            instance.namespace().unwrap_or_default(),
            instance.name_any()
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}
