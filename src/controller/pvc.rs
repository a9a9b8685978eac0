use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::{
    api::{DeleteParams, PostParams, Preconditions},
    runtime::reflector::{ObjectRef, Store},
    Api, Client, ResourceExt,
};
use tracing::{debug, info};

/// Read port over the local PVC cache.
pub trait PvcLister: Send + Sync {
    fn get_pvc(&self, namespace: &str, name: &str) -> Option<Arc<PersistentVolumeClaim>>;

    /// Every cached PVC in `namespace` carrying all of `selector`'s labels.
    fn list_pvcs(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Vec<Arc<PersistentVolumeClaim>>;
}

impl PvcLister for Store<PersistentVolumeClaim> {
    fn get_pvc(&self, namespace: &str, name: &str) -> Option<Arc<PersistentVolumeClaim>> {
        self.get(&ObjectRef::new(name).within(namespace))
    }

    fn list_pvcs(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Vec<Arc<PersistentVolumeClaim>> {
        let mut pvcs: Vec<_> = self
            .state()
            .into_iter()
            .filter(|pvc| pvc.namespace().as_deref() == Some(namespace))
            .filter(|pvc| {
                let labels = pvc.labels();
                selector.iter().all(|(k, v)| labels.get(k) == Some(v))
            })
            .collect();
        pvcs.sort_by_key(|pvc| pvc.name_any());
        pvcs
    }
}

/// Mutations against live PVC objects.
#[async_trait]
pub trait PvcControl: Send + Sync {
    /// Deletes exactly this PVC. A PVC that is already gone surfaces as a
    /// NotFound error, see [`is_not_found`].
    async fn delete_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<(), kube::Error>;

    async fn update_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, kube::Error>;
}

pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

pub struct KubePvcControl {
    client: Client,
    field_manager: String,
}

impl KubePvcControl {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, pvc: &PersistentVolumeClaim) -> Api<PersistentVolumeClaim> {
        let ns = pvc.namespace().unwrap_or("default".to_string());
        Api::namespaced(self.client.clone(), &ns)
    }
}

#[async_trait]
impl PvcControl for KubePvcControl {
    async fn delete_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<(), kube::Error> {
        // the uid precondition keeps a recreated claim with the same name alive
        let dp = DeleteParams {
            preconditions: pvc.uid().map(|uid| Preconditions {
                uid: Some(uid),
                resource_version: None,
            }),
            ..Default::default()
        };
        self.api(pvc).delete(&pvc.name_any(), &dp).await?;
        info!(
            "Deleted PVC {}/{}",
            pvc.namespace().unwrap_or_default(),
            pvc.name_any()
        );
        Ok(())
    }

    async fn update_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, kube::Error> {
        let pp = PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        };
        let updated = self.api(pvc).replace(&pvc.name_any(), &pp, pvc).await?;
        debug!(
            "Updated PVC {}/{} to resourceVersion {:?}",
            updated.namespace().unwrap_or_default(),
            updated.name_any(),
            updated.resource_version()
        );
        Ok(updated)
    }
}
