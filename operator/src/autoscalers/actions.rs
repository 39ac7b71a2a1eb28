use super::reconcile::ContextData;
use crate::util::{Error, MANAGER_NAME, events::EventReason};
use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
    runtime::events::EventType,
};
use loputoo_types::*;

/// Writes the webhook's decision into the GameType's embedded fleet
/// scaling block. The GameType controller forwards it into the active
/// Fleet on its next pass.
pub async fn scale_gametype(
    context: &ContextData,
    instance: &GameAutoscaler,
    gametype: &GameType,
    desired_replicas: i32,
) -> Result<(), Error> {
    let namespace = gametype
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<GameType> = Api::namespaced(context.client.clone(), &namespace);
    let patch = serde_json::json!({"spec": {"fleet": {"scaling": {"replicas": desired_replicas}}}});
    if let Err(e) = api
        .patch(
            &gametype.name_any(),
            &PatchParams::apply(MANAGER_NAME),
            &Patch::Merge(&patch),
        )
        .await
    {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::GameautoscalerScale,
                "failed to update the gametype",
            )
            .await;
        return Err(e.into());
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GameautoscalerScale,
            format!("Scaling game to {}", desired_replicas),
        )
        .await;
    Ok(())
}
