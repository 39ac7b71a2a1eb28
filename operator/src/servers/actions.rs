use super::reconcile::ContextData;
use crate::util::{
    Error,
    conditions::{new_condition, set_condition},
    events::EventReason,
    finalizer,
    patch::patch_status,
    pod::build_server_pod,
};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, Client, Resource, ResourceExt,
    runtime::events::EventType,
};
use loputoo_types::*;

/// Records the Server finalizer so the orchestrator cannot drop the
/// object before the consent handshake has run.
pub async fn add_finalizer(context: &ContextData, instance: &Server) -> Result<(), Error> {
    if let Err(e) =
        finalizer::add(context.client.clone(), instance, finalizers::SERVER).await
    {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::ServerUpdateFailed,
                format!("Failed to add finalizer: {}", e),
            )
            .await;
        return Err(e);
    }
    context
        .events
        .publish(
            instance,
            EventType::Normal,
            EventReason::ServerInitialized,
            "Server finalizer added",
        )
        .await;
    Ok(())
}

/// Deletion branch. Consults the gate; when consent is withheld the
/// reconciliation fails with a retryable error and no state is mutated.
/// When allowed, the Pod goes first and the Server finalizer last.
pub async fn finalize(
    context: &ContextData,
    instance: &Server,
    namespace: &str,
) -> Result<(), Error> {
    if !finalizer::contains(instance, finalizers::SERVER) {
        // Nothing holds the object; the orchestrator finishes deletion.
        return Ok(());
    }

    let pods: Api<Pod> = Api::namespaced(context.client.clone(), namespace);
    let pod = match pods.get(&instance.pod_name()).await {
        Ok(pod) => Some(pod),
        Err(kube::Error::Api(ae)) if ae.code == 404 => None,
        Err(e) => return Err(e.into()),
    };

    if let Some(pod) = pod {
        let allowed = context.gate.is_deletion_allowed(instance, &pod).await?;
        if !allowed {
            context
                .events
                .publish(
                    instance,
                    EventType::Warning,
                    EventReason::ServerDeletionNotAllowed,
                    "Server deletion not currently allowed",
                )
                .await;
            return Err(Error::DeletionNotAllowed(instance.name_any()));
        }

        context
            .events
            .publish(
                instance,
                EventType::Normal,
                EventReason::ServerDeletionAllowed,
                "Server deletion allowed, removing pod",
            )
            .await;

        if finalizer::contains(&pod, finalizers::SERVER) {
            finalizer::remove(context.client.clone(), &pod, finalizers::SERVER).await?;
        }

        if pod.meta().deletion_timestamp.is_none() {
            match pods.delete(&instance.pod_name(), &Default::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(ae)) if ae.code == 404 => {}
                Err(e) => {
                    patch_status(context.client.clone(), instance, |status: &mut ServerStatus| {
                        set_condition(
                            status.conditions.get_or_insert_default(),
                            new_condition(
                                "Finalizing",
                                "False",
                                "PodDeletionFailed",
                                "Failed to delete the Pod during finalization",
                            ),
                        );
                    })
                    .await?;
                    return Err(e.into());
                }
            }
        }

        patch_status(context.client.clone(), instance, |status: &mut ServerStatus| {
            set_condition(
                status.conditions.get_or_insert_default(),
                new_condition(
                    "Finalizing",
                    "True",
                    "PodDeleted",
                    "Pod successfully deleted during finalization",
                ),
            );
        })
        .await?;

        context
            .events
            .publish(
                instance,
                EventType::Normal,
                EventReason::ServerPodDeleted,
                "Server pod deleted",
            )
            .await;
    }

    finalizer::remove(context.client.clone(), instance, finalizers::SERVER).await?;
    Ok(())
}

/// Creates the Server's Pod from the template plus the injected sidecar.
pub async fn create_pod(
    context: &ContextData,
    instance: &Server,
    namespace: &str,
) -> Result<(), Error> {
    let pod = build_server_pod(
        instance,
        &context.pods.sidecar_image,
        context.pods.image_pull_secret.as_deref(),
    )?;
    let pods: Api<Pod> = Api::namespaced(context.client.clone(), namespace);
    match pods.create(&Default::default(), &pod).await {
        Ok(_) => {}
        // Another worker or a previous pass won the race.
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(e) => {
            context
                .events
                .publish(
                    instance,
                    EventType::Warning,
                    EventReason::ServerPodCreationFailed,
                    format!("Failed to create the Pod: {}", e),
                )
                .await;
            patch_status(context.client.clone(), instance, |status: &mut ServerStatus| {
                set_condition(
                    status.conditions.get_or_insert_default(),
                    new_condition(
                        "PodFailed",
                        "False",
                        "PodCreationFailed",
                        "Failed to create the Pod",
                    ),
                );
            })
            .await?;
            return Err(e.into());
        }
    }

    patch_status(context.client.clone(), instance, |status: &mut ServerStatus| {
        set_condition(
            status.conditions.get_or_insert_default(),
            new_condition(
                "PodCreated",
                "True",
                "PodCreatedSuccessfully",
                "Pod has been successfully created",
            ),
        );
    })
    .await?;
    Ok(())
}

/// Mirrors the Server finalizer onto the owned Pod so the Pod cannot
/// disappear out from under a Server that is still waiting for consent.
pub async fn ensure_pod_finalizer(
    context: &ContextData,
    instance: &Server,
    namespace: &str,
) -> Result<(), Error> {
    let pods: Api<Pod> = Api::namespaced(context.client.clone(), namespace);
    let pod = pods.get(&instance.pod_name()).await?;
    if let Err(e) = finalizer::add(context.client.clone(), &pod, finalizers::SERVER).await {
        context
            .events
            .publish(
                instance,
                EventType::Warning,
                EventReason::ServerUpdateFailed,
                format!("Failed to add finalizer to pod: {}", e),
            )
            .await;
        return Err(e);
    }
    Ok(())
}

/// Keeps the steady-state condition fresh.
pub async fn refresh_status(client: Client, instance: &Server) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut ServerStatus| {
        set_condition(
            status.conditions.get_or_insert_default(),
            new_condition(
                "PodCreated",
                "True",
                "PodAlreadyExists",
                "Pod already exists",
            ),
        );
    })
    .await?;
    Ok(())
}
