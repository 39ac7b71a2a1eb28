use super::reconcile::{ContextData, list_fleets};
use crate::util::{Error, MANAGER_NAME, events::EventReason, finalizer, patch::patch_status};
use k8s_openapi::jiff::Timestamp;
use kube::{
    Api, Resource, ResourceExt,
    api::{ObjectMeta, Patch, PatchParams},
    runtime::events::EventType,
};
use loputoo_types::*;

pub async fn add_finalizer(context: &ContextData, instance: &GameType) -> Result<(), Error> {
    if let Err(e) =
        finalizer::add(context.client.clone(), instance, finalizers::GAME_TYPE).await
    {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::GametypeInitialized,
                format!("Failed to add finalizers: {}", e),
            )
            .await;
        return Err(e);
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeInitialized,
            "Added finalizers to game",
        )
        .await;
    Ok(())
}

/// Deletion branch: delete child Fleets and release the finalizer once
/// none remain. Returns true when the GameType is fully released.
pub async fn finalize(context: &ContextData, instance: &GameType) -> Result<bool, Error> {
    if !finalizer::contains(instance, finalizers::GAME_TYPE) {
        return Ok(true);
    }

    let fleets = list_fleets(context.client.clone(), instance).await?;
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<Fleet> = Api::namespaced(context.client.clone(), &namespace);
    for fleet in &fleets {
        if fleet.meta().deletion_timestamp.is_some() {
            continue;
        }
        match api.delete(&fleet.name_any(), &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(e) => {
                context
                    .events
                    .publish(
                        instance,
                        EventType::Warning,
                        EventReason::GametypeServersDeleted,
                        format!("Failed to delete fleet {}", fleet.name_any()),
                    )
                    .await;
                return Err(e.into());
            }
        }
    }

    let remaining = list_fleets(context.client.clone(), instance).await?;
    if !remaining.is_empty() {
        return Ok(false);
    }

    finalizer::remove(context.client.clone(), instance, finalizers::GAME_TYPE).await?;
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeServersDeleted,
            "Removed finalizer",
        )
        .await;
    Ok(true)
}

pub async fn create_initial_fleet(context: &ContextData, instance: &GameType) -> Result<(), Error> {
    create_fleet(context, instance).await?;
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeInitialized,
            "Created initial fleet",
        )
        .await;
    Ok(())
}

/// Rollout step one: stand up the replacement Fleet. The outdated Fleet
/// keeps serving until a later pass observes two Fleets and removes the
/// oldest, so an active GameType never drops to zero Fleets.
pub async fn replace_fleet(context: &ContextData, instance: &GameType) -> Result<(), Error> {
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeSpecUpdated,
            "Creating new fleet",
        )
        .await;
    create_fleet(context, instance).await
}

async fn create_fleet(context: &ContextData, instance: &GameType) -> Result<(), Error> {
    let fleet = fleet_resource(instance)?;
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<Fleet> = Api::namespaced(context.client.clone(), &namespace);
    if let Err(e) = api.create(&Default::default(), &fleet).await {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::GametypeReplicasUpdated,
                format!("Failed to create new fleet {}", e),
            )
            .await;
        return Err(e.into());
    }
    Ok(())
}

/// Forwards the GameType's desired replica count into the active Fleet.
pub async fn patch_fleet_replicas(
    context: &ContextData,
    instance: &GameType,
    fleet_name: &str,
    replicas: i32,
) -> Result<(), Error> {
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<Fleet> = Api::namespaced(context.client.clone(), &namespace);
    let patch = serde_json::json!({"spec": {"scaling": {"replicas": replicas}}});
    api.patch(
        fleet_name,
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(&patch),
    )
    .await?;
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeReplicasUpdated,
            format!("Scaling gametype to {}", replicas),
        )
        .await;
    Ok(())
}

/// More than one Fleet is live; retire the oldest one that is not already
/// being deleted. Converges to a single Fleet even under racing passes.
pub async fn delete_oldest_fleet(context: &ContextData, instance: &GameType) -> Result<(), Error> {
    let fleets = list_fleets(context.client.clone(), instance).await?;
    let oldest = fleets
        .iter()
        .filter(|fleet| fleet.meta().deletion_timestamp.is_none())
        .min_by_key(|fleet| {
            fleet
                .meta()
                .creation_timestamp
                .as_ref()
                .map(|t| t.0)
                .unwrap_or(Timestamp::UNIX_EPOCH)
        });

    let Some(oldest) = oldest else {
        // Every extra Fleet is already on its way out.
        return Ok(());
    };

    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.namespace".to_string()))?;
    let api: Api<Fleet> = Api::namespaced(context.client.clone(), &namespace);
    match api.delete(&oldest.name_any(), &Default::default()).await {
        Ok(_) => {}
        Err(kube::Error::Api(ae)) if ae.code == 404 => {}
        Err(e) => return Err(e.into()),
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::GametypeSpecUpdated,
            "Deleting extra fleet",
        )
        .await;
    Ok(())
}

pub async fn sync_status(
    context: &ContextData,
    instance: &GameType,
    fleet_name: &str,
) -> Result<(), Error> {
    let fleet_name = fleet_name.to_string();
    patch_status(context.client.clone(), instance, |status: &mut GameTypeStatus| {
        status.current_fleet = Some(fleet_name);
    })
    .await?;
    Ok(())
}

/// A Fleet stamped out of the GameType's template: generated name,
/// inherited labels plus the type label, and an owner reference.
fn fleet_resource(gametype: &GameType) -> Result<Fleet, Error> {
    let name = gametype
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("GameType is missing metadata.name".to_string()))?;
    let owner_ref = gametype
        .controller_owner_ref(&())
        .ok_or_else(|| Error::UserInput("GameType is missing object metadata".to_string()))?;

    let mut labels = gametype.labels().clone();
    labels.insert(labels::GAME_TYPE.to_string(), name.to_string());

    Ok(Fleet {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            namespace: gametype.metadata.namespace.clone(),
            labels: Some(labels),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: gametype.spec.fleet.clone(),
        status: None,
    })
}
