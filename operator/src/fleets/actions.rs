use super::reconcile::{ContextData, list_servers};
use crate::util::{
    Error, events::EventReason, eviction::find_delete_server, finalizer, patch::patch_status,
};
use kube::{
    Api, Resource, ResourceExt,
    api::ObjectMeta,
    runtime::events::EventType,
};
use loputoo_types::*;

pub async fn add_finalizer(context: &ContextData, instance: &Fleet) -> Result<(), Error> {
    if let Err(e) = finalizer::add(context.client.clone(), instance, finalizers::FLEET).await {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::FleetUpdateFailed,
                format!("Fleet finalizer update failed: {}", e),
            )
            .await;
        return Err(e);
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::FleetInitialized,
            "Fleet finalizers added",
        )
        .await;
    Ok(())
}

/// Deletion branch: issue deletes on every child and only release the
/// Fleet finalizer once no children remain. Each child negotiates its own
/// consent handshake. Returns true when the Fleet is fully released.
pub async fn finalize(context: &ContextData, instance: &Fleet) -> Result<bool, Error> {
    let servers = list_servers(context.client.clone(), instance).await?;
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Fleet is missing metadata.namespace".to_string()))?;
    let api: Api<Server> = Api::namespaced(context.client.clone(), &namespace);
    for server in &servers {
        if server.meta().deletion_timestamp.is_some() {
            continue;
        }
        match api.delete(&server.name_any(), &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    let remaining = list_servers(context.client.clone(), instance).await?;
    if !remaining.is_empty() {
        return Ok(false);
    }

    if finalizer::contains(instance, finalizers::FLEET) {
        if let Err(e) =
            finalizer::remove(context.client.clone(), instance, finalizers::FLEET).await
        {
            context
                .events
                .publish(
                    instance,
                    EventType::Warning,
                    EventReason::FleetUpdateFailed,
                    format!("Failed to remove finalizer: {}", e),
                )
                .await;
            return Err(e);
        }
        context
            .events
            .publish(
                instance,
                EventType::Normal,
                EventReason::FleetServersRemoved,
                "Fleet finalizers removed correctly",
            )
            .await;
    }
    Ok(true)
}

/// Creates `count` Servers from the Fleet's template.
pub async fn scale_up(context: &ContextData, instance: &Fleet, count: i32) -> Result<(), Error> {
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Fleet is missing metadata.namespace".to_string()))?;
    let api: Api<Server> = Api::namespaced(context.client.clone(), &namespace);
    for _ in 0..count {
        let server = server_resource(instance)?;
        api.create(&Default::default(), &server).await?;
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::FleetScaleServers,
            format!("Scaled servers up to {}", instance.spec.scaling.replicas),
        )
        .await;
    refresh_current_replicas(context, instance).await
}

/// Removes one Server per pass, chosen by the eviction policy.
pub async fn scale_down(context: &ContextData, instance: &Fleet) -> Result<(), Error> {
    let servers = list_servers(context.client.clone(), instance).await?;
    let victim = find_delete_server(instance, &servers, context.probe.as_ref()).await?;

    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Fleet is missing metadata.namespace".to_string()))?;
    let api: Api<Server> = Api::namespaced(context.client.clone(), &namespace);
    match api.delete(&victim.name_any(), &Default::default()).await {
        Ok(_) => {}
        Err(kube::Error::Api(ae)) if ae.code == 404 => {}
        Err(e) => return Err(e.into()),
    }

    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::FleetScaleServers,
            format!("Scaled servers down to {}", instance.spec.scaling.replicas),
        )
        .await;
    refresh_current_replicas(context, instance).await
}

pub async fn sync_status(
    context: &ContextData,
    instance: &Fleet,
    current: i32,
) -> Result<(), Error> {
    if let Err(e) = patch_status(context.client.clone(), instance, |status: &mut FleetStatus| {
        status.current_replicas = current;
    })
    .await
    {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::FleetUpdateFailed,
                format!("Failed to update Fleet status: {}", e),
            )
            .await;
        return Err(e.into());
    }
    Ok(())
}

async fn refresh_current_replicas(context: &ContextData, instance: &Fleet) -> Result<(), Error> {
    let current = list_servers(context.client.clone(), instance).await?.len() as i32;
    sync_status(context, instance, current).await
}

/// A child Server stamped out of the Fleet's template: generated name,
/// inherited labels plus the fleet label, and an owner reference so
/// cascade semantics apply if the finalizer is ever forced off.
fn server_resource(fleet: &Fleet) -> Result<Server, Error> {
    let name = fleet
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("Fleet is missing metadata.name".to_string()))?;
    let owner_ref = fleet
        .controller_owner_ref(&())
        .ok_or_else(|| Error::UserInput("Fleet is missing object metadata".to_string()))?;

    let mut labels = fleet.labels().clone();
    labels.insert(labels::FLEET.to_string(), name.to_string());

    Ok(Server {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            namespace: fleet.metadata.namespace.clone(),
            labels: Some(labels),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: fleet.spec.server.clone(),
        status: None,
    })
}
