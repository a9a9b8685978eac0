use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::{ObjectRef, Store};

/// Read port over the local pod cache. `None` means the cache has no such pod.
pub trait PodLister: Send + Sync {
    fn get_pod(&self, namespace: &str, name: &str) -> Option<Arc<Pod>>;
}

impl PodLister for Store<Pod> {
    fn get_pod(&self, namespace: &str, name: &str) -> Option<Arc<Pod>> {
        self.get(&ObjectRef::new(name).within(namespace))
    }
}

/// Claim names of every PVC-backed volume the pod declares, in declaration order.
pub fn claim_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_ref())
        .map(|volumes| {
            volumes
                .iter()
                .filter_map(|v| v.persistent_volume_claim.as_ref())
                .map(|pvc| pvc.claim_name.clone())
                .collect()
        })
        .unwrap_or_default()
}
