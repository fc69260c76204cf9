//! Idempotent apply engine
//!
//! Materializes a desired child resource with fetch-or-create followed by
//! in-place mutation, keyed by deterministic identity derived from the
//! owner's name. Safe to re-run at arbitrary frequency: a second pass with
//! no external change performs zero creates and rewrites identical content.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::NamespaceResourceScope;
use kube::api::PostParams;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::controller::error::{Error, Result};

/// Fetch-or-create the object named `name`, apply `build` to a draft, set
/// the owner linkage, and persist. Returns whether a create happened.
///
/// The mutation runs against a fresh draft; if it fails, nothing is
/// persisted. A create that loses the race to a concurrent writer (409)
/// is treated as success-via-update on the object that won.
pub async fn apply_or_create<T, F>(
    client: &Client,
    namespace: &str,
    name: &str,
    owner: &OwnerReference,
    build: F,
) -> Result<bool>
where
    T: Resource<Scope = NamespaceResourceScope>
        + Serialize
        + DeserializeOwned
        + Clone
        + Default
        + std::fmt::Debug,
    <T as Resource>::DynamicType: Default,
    F: Fn(&mut T) -> Result<()>,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);

    if let Some(existing) = api.get_opt(name).await? {
        let mut draft = existing;
        build(&mut draft)?;
        set_owner(&mut draft, owner);
        api.replace(name, &PostParams::default(), &draft).await?;
        debug!(name = %name, "Updated child resource");
        return Ok(false);
    }

    let mut draft = T::default();
    draft.meta_mut().name = Some(name.to_string());
    draft.meta_mut().namespace = Some(namespace.to_string());
    build(&mut draft)?;
    set_owner(&mut draft, owner);

    match api.create(&PostParams::default(), &draft).await {
        Ok(_) => {
            debug!(name = %name, "Created child resource");
            Ok(true)
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            // Lost the create race: converge onto the existing object.
            let mut draft = api.get(name).await?;
            build(&mut draft)?;
            set_owner(&mut draft, owner);
            api.replace(name, &PostParams::default(), &draft).await?;
            Ok(false)
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Record the owner reference, replacing any previous controller linkage.
fn set_owner<T: Resource>(obj: &mut T, owner: &OwnerReference) {
    obj.meta_mut().owner_references = Some(vec![owner.clone()]);
}
