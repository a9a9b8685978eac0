#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ctor::ctor;
use k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{
        PersistentVolumeClaim, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume,
    },
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::ObjectMeta,
    core::ErrorResponse,
    runtime::{
        reflector::{self, store::Writer},
        watcher,
    },
};
use pd_member_scaler::{
    api::{
        constants::{ANN_PVC_DEFER_DELETING, LABEL_COMPONENT, LABEL_INSTANCE, LABEL_POD_NAME},
        v1::tidbcluster::{PdMember, TidbCluster},
    },
    config::ScalerConfig,
    controller::{Dependencies, PvcControl},
    member::{
        utils::{ordinal_pvc_name, pd_pod_name, set_replicas, MemberType},
        PdScaler,
    },
    pdapi::{self, MemberInfo, PdAction, PdClient, PdControl},
    telemetry,
};

pub const TC_NAME: &str = "demo";
pub const NAMESPACE: &str = "default";
pub const SET_NAME: &str = "demo-pd";

#[ctor]
fn on_startup() {
    let _ = telemetry::init();
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "API server failed".to_string(),
        reason: reason.to_string(),
        code,
    })
}

/// Records every PD call; any action can be made to fail.
pub struct FakePdClient {
    leader: Mutex<String>,
    failing: Mutex<Vec<PdAction>>,
    calls: Mutex<Vec<(PdAction, String)>>,
}

impl FakePdClient {
    pub fn new(leader: &str) -> Self {
        Self {
            leader: Mutex::new(leader.to_string()),
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_leader(&self, leader: &str) {
        *self.leader.lock().unwrap() = leader.to_string();
    }

    pub fn fail(&self, action: PdAction) {
        self.failing.lock().unwrap().push(action);
    }

    pub fn calls(&self) -> Vec<(PdAction, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<PdAction> {
        self.calls().into_iter().map(|(a, _)| a).collect()
    }

    fn record(&self, action: PdAction, arg: &str) -> Result<(), pdapi::Error> {
        self.calls.lock().unwrap().push((action, arg.to_string()));
        if self.failing.lock().unwrap().contains(&action) {
            return Err(pdapi::Error::Status {
                action,
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PdClient for FakePdClient {
    async fn get_pd_leader(&self) -> Result<MemberInfo, pdapi::Error> {
        self.record(PdAction::GetLeader, "")?;
        Ok(MemberInfo {
            name: self.leader.lock().unwrap().clone(),
            ..Default::default()
        })
    }

    async fn transfer_pd_leader(&self, member_name: &str) -> Result<(), pdapi::Error> {
        self.record(PdAction::TransferLeader, member_name)?;
        self.set_leader(member_name);
        Ok(())
    }

    async fn delete_member(&self, member_name: &str) -> Result<(), pdapi::Error> {
        self.record(PdAction::DeleteMember, member_name)
    }
}

pub struct FakePdControl {
    pub client: Arc<FakePdClient>,
}

impl PdControl for FakePdControl {
    fn pd_client(&self, _namespace: &str, _tc_name: &str, _tls_enabled: bool) -> Arc<dyn PdClient> {
        self.client.clone()
    }
}

/// PVC mutations that only get recorded. Errors are injected as an HTTP
/// status code for the next (and every later) call.
#[derive(Default)]
pub struct FakePvcControl {
    delete_error: Mutex<Option<u16>>,
    update_error: Mutex<Option<u16>>,
    pub deleted: Mutex<Vec<String>>,
    pub updated: Mutex<Vec<PersistentVolumeClaim>>,
}

impl FakePvcControl {
    pub fn set_delete_pvc_error(&self, code: u16) {
        *self.delete_error.lock().unwrap() = Some(code);
    }

    pub fn set_update_pvc_error(&self, code: u16) {
        *self.update_error.lock().unwrap() = Some(code);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<PersistentVolumeClaim> {
        self.updated.lock().unwrap().clone()
    }
}

#[async_trait]
impl PvcControl for FakePvcControl {
    async fn delete_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<(), kube::Error> {
        if let Some(code) = *self.delete_error.lock().unwrap() {
            return Err(api_error(code, "InternalError"));
        }
        self.deleted
            .lock()
            .unwrap()
            .push(pvc.metadata.name.clone().unwrap_or_default());
        Ok(())
    }

    async fn update_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, kube::Error> {
        if let Some(code) = *self.update_error.lock().unwrap() {
            return Err(api_error(code, "InternalError"));
        }
        self.updated.lock().unwrap().push(pvc.clone());
        Ok(pvc.clone())
    }
}

pub struct FakeScaler {
    pub scaler: PdScaler,
    pub pd: Arc<FakePdClient>,
    pub pvc_control: Arc<FakePvcControl>,
    pods: Writer<Pod>,
    pvcs: Writer<PersistentVolumeClaim>,
}

impl FakeScaler {
    pub fn new() -> Self {
        Self::with_config(ScalerConfig::default())
    }

    pub fn with_config(config: ScalerConfig) -> Self {
        let pd = Arc::new(FakePdClient::new(&pd_pod_name(TC_NAME, 0)));
        let pvc_control = Arc::new(FakePvcControl::default());
        let (pod_store, pods) = reflector::store::<Pod>();
        let (pvc_store, pvcs) = reflector::store::<PersistentVolumeClaim>();
        let deps = Dependencies {
            pd_control: Arc::new(FakePdControl { client: pd.clone() }),
            pvc_control: pvc_control.clone(),
            pod_lister: Arc::new(pod_store),
            pvc_lister: Arc::new(pvc_store),
            config,
        };
        Self {
            scaler: PdScaler::new(deps),
            pd,
            pvc_control,
            pods,
            pvcs,
        }
    }

    pub fn add_pod(&mut self, pod: Pod) {
        self.pods.apply_watcher_event(&watcher::Event::Apply(pod));
    }

    pub fn add_pvc(&mut self, pvc: PersistentVolumeClaim) {
        self.pvcs.apply_watcher_event(&watcher::Event::Apply(pvc));
    }
}

const TIDB_CLUSTER_YAML: &str = r#"
apiVersion: pingcap.com/v1alpha1
kind: TidbCluster
metadata:
  name: demo
  namespace: default
spec:
  pd:
    replicas: 5
status:
  pd:
    synced: true
    phase: Normal
"#;

pub fn new_tidb_cluster_for_pd() -> TidbCluster {
    serde_yaml::from_str(TIDB_CLUSTER_YAML).expect("fixture parses")
}

/// Marks ordinals 0..5 as healthy PD members.
pub fn normal_pd_member(tc: &mut TidbCluster) {
    let status = tc.status.get_or_insert_with(Default::default);
    status.pd.members = (0..5)
        .map(|i| {
            let name = pd_pod_name(TC_NAME, i);
            (
                name.clone(),
                PdMember {
                    name,
                    health: true,
                    ..Default::default()
                },
            )
        })
        .collect();
}

pub fn new_stateful_set_for_pd_scale(replicas: i32) -> StatefulSet {
    let mut set = StatefulSet {
        metadata: ObjectMeta {
            name: Some(SET_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec::default()),
        ..Default::default()
    };
    set_replicas(&mut set, replicas);
    set
}

/// PVC claimed by the PD pod at `ordinal`, named `<name>` or `<name><suffix>`.
pub fn new_pvc_for_ordinal(ordinal: i32, suffix: &str) -> PersistentVolumeClaim {
    let name = format!("{}{}", ordinal_pvc_name(MemberType::Pd, SET_NAME, ordinal), suffix);
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            uid: Some(format!("uid-{name}")),
            name: Some(name),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([
                (LABEL_INSTANCE.clone(), TC_NAME.to_string()),
                (LABEL_COMPONENT.clone(), MemberType::Pd.to_string()),
                (LABEL_POD_NAME.clone(), pd_pod_name(TC_NAME, ordinal)),
            ])),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn with_defer_deleting(mut pvc: PersistentVolumeClaim) -> PersistentVolumeClaim {
    pvc.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ANN_PVC_DEFER_DELETING.clone(), Utc::now().to_rfc3339());
    pvc
}

/// PD pod at `ordinal` mounting the given claims.
pub fn new_pd_pod(ordinal: i32, claims: &[&str]) -> Pod {
    let volumes = claims
        .iter()
        .enumerate()
        .map(|(i, claim)| Volume {
            name: format!("pd-{i}"),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_string(),
                read_only: None,
            }),
            ..Default::default()
        })
        .collect();
    Pod {
        metadata: ObjectMeta {
            name: Some(pd_pod_name(TC_NAME, ordinal)),
            namespace: Some(NAMESPACE.to_string()),
            creation_timestamp: Some(Time(Utc::now() - Duration::hours(1))),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            ..Default::default()
        }),
        ..Default::default()
    }
}
