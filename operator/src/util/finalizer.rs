use super::{Error, MANAGER_NAME};
use kube::{
    Api, Client, ResourceExt,
    api::{Patch, PatchParams, Resource},
    core::NamespaceResourceScope,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub fn contains<T: ResourceExt>(obj: &T, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

/// Record the finalizer on the object. No-op when already present.
pub async fn add<T>(client: Client, obj: &T, finalizer: &str) -> Result<T, Error>
where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let mut finalizers = obj.finalizers().to_vec();
    if finalizers.iter().any(|f| f == finalizer) {
        return Ok(obj.clone());
    }
    finalizers.push(finalizer.to_string());
    patch_finalizers(client, obj, finalizers).await
}

/// Drop the finalizer from the object, releasing it for deletion.
pub async fn remove<T>(client: Client, obj: &T, finalizer: &str) -> Result<T, Error>
where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let mut finalizers = obj.finalizers().to_vec();
    finalizers.retain(|f| f != finalizer);
    patch_finalizers(client, obj, finalizers).await
}

async fn patch_finalizers<T>(client: Client, obj: &T, finalizers: Vec<String>) -> Result<T, Error>
where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let name = obj
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("object is missing metadata.name".to_string()))?;
    let namespace = obj
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("object is missing metadata.namespace".to_string()))?;
    let api: Api<T> = Api::namespaced(client, namespace);
    let patch = serde_json::json!({"metadata": {"finalizers": finalizers}});
    Ok(api
        .patch(name, &PatchParams::apply(MANAGER_NAME), &Patch::Merge(&patch))
        .await?)
}
