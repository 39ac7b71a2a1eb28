use super::MANAGER_NAME;
use kube::{
    Client, Resource,
    runtime::events::{Event, EventType, Recorder, Reporter},
};
use owo_colors::OwoColorize;

/// Reasons attached to the events this operator emits. The strings are
/// stable and observable by cluster tooling; add new variants instead of
/// renaming existing ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventReason {
    ServerInitialized,
    ServerDeletionAllowed,
    ServerDeletionNotAllowed,
    ServerPodDeleted,
    ServerPodCreationFailed,
    ServerUpdateFailed,
    FleetInitialized,
    FleetUpdateFailed,
    FleetServersRemoved,
    FleetScaleServers,
    GametypeInitialized,
    GametypeServersDeleted,
    GametypeSpecUpdated,
    GametypeReplicasUpdated,
    GameAutoscalerInvalidServer,
    GameautoscalerInvalidAutoscalePolicy,
    GameautoscalerInvalidSyncType,
    GameautoscalerWebhook,
    GameautoscalerScale,
}

impl EventReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::ServerInitialized => "ServerInitialized",
            EventReason::ServerDeletionAllowed => "ServerDeletionAllowed",
            EventReason::ServerDeletionNotAllowed => "ServerDeletionNotAllowed",
            EventReason::ServerPodDeleted => "ServerPodDeleted",
            EventReason::ServerPodCreationFailed => "ServerPodCreationFailed",
            EventReason::ServerUpdateFailed => "ServerUpdateFailed",
            EventReason::FleetInitialized => "FleetInitialized",
            EventReason::FleetUpdateFailed => "FleetUpdateFailed",
            EventReason::FleetServersRemoved => "FleetServersRemoved",
            EventReason::FleetScaleServers => "FleetScaleServers",
            EventReason::GametypeInitialized => "GametypeInitialized",
            EventReason::GametypeServersDeleted => "GametypeServersDeleted",
            EventReason::GametypeSpecUpdated => "GametypeSpecUpdated",
            EventReason::GametypeReplicasUpdated => "GametypeReplicasUpdated",
            EventReason::GameAutoscalerInvalidServer => "GameAutoscalerInvalidServer",
            EventReason::GameautoscalerInvalidAutoscalePolicy => {
                "GameautoscalerInvalidAutoscalePolicy"
            }
            EventReason::GameautoscalerInvalidSyncType => "GameautoscalerInvalidSyncType",
            EventReason::GameautoscalerWebhook => "GameautoscalerWebhook",
            EventReason::GameautoscalerScale => "GameautoscalerScale",
        }
    }
}

/// Publishes orchestrator events for managed objects. Emission is
/// best-effort: a failed publish is logged and otherwise ignored so event
/// plumbing never fails a reconciliation.
#[derive(Clone)]
pub struct EventPublisher {
    recorder: Recorder,
}

impl EventPublisher {
    pub fn new(client: Client) -> Self {
        EventPublisher {
            recorder: Recorder::new(
                client,
                Reporter {
                    controller: MANAGER_NAME.to_string(),
                    instance: std::env::var("POD_NAME").ok(),
                },
            ),
        }
    }

    pub async fn publish<T>(
        &self,
        obj: &T,
        type_: EventType,
        reason: EventReason,
        note: impl Into<String>,
    ) where
        T: Resource<DynamicType = ()>,
    {
        let event = Event {
            type_,
            reason: reason.as_str().to_string(),
            note: Some(note.into()),
            action: reason.as_str().to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &obj.object_ref(&())).await {
            eprintln!(
                "{}",
                format!("Failed to publish {} event: {}", reason.as_str(), e).yellow()
            );
        }
    }
}
