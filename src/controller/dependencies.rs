use std::sync::Arc;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::{runtime::reflector::Store, Client};

use crate::{config::ScalerConfig, pdapi::PdControl};

use super::{KubePvcControl, PodLister, PvcControl, PvcLister};

/// Everything a member scaler reaches outside its own arguments
#[derive(Clone)]
pub struct Dependencies {
    /// PD API clients, one per cluster
    pub pd_control: Arc<dyn PdControl>,
    /// Live PVC mutations
    pub pvc_control: Arc<dyn PvcControl>,
    /// Local pod cache
    pub pod_lister: Arc<dyn PodLister>,
    /// Local PVC cache
    pub pvc_lister: Arc<dyn PvcLister>,
    pub config: ScalerConfig,
}

impl Dependencies {
    /// Wire the ports onto a kube client and the reflector stores fed by
    /// the reconciler's watchers.
    pub fn new(
        client: Client,
        pd_control: Arc<dyn PdControl>,
        pods: Store<Pod>,
        pvcs: Store<PersistentVolumeClaim>,
        config: ScalerConfig,
    ) -> Self {
        Self {
            pd_control,
            pvc_control: Arc::new(KubePvcControl::new(client, config.field_manager.clone())),
            pod_lister: Arc::new(pods),
            pvc_lister: Arc::new(pvcs),
            config,
        }
    }
}
