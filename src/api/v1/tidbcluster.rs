use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use garde::Validate;
use k8s_openapi::api::apps::v1::StatefulSetStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, Validate)]
#[kube(
    group = "pingcap.com",
    version = "v1alpha1",
    kind = "TidbCluster",
    status = "TidbClusterStatus",
    shortname = "tc",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TidbClusterSpec {
    #[garde(dive)]
    pub pd: PdSpec,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cluster: Option<TlsCluster>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PdSpec {
    /// Desired number of PD members. Zero decommissions the PD group.
    #[garde(range(min = 0))]
    pub replicas: i32,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct TlsCluster {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TidbClusterStatus {
    #[serde(default)]
    pub pd: PdStatus,
    #[serde(default)]
    pub tikv: TikvStatus,
    #[serde(default)]
    pub tidb: TidbStatus,
    #[serde(default)]
    pub tiflash: TikvStatus,
    #[serde(default)]
    pub ticdc: StatefulComponentStatus,
    #[serde(default)]
    pub pump: StatefulComponentStatus,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
/// Lifecycle phase of a member group
pub enum MemberPhase {
    #[default]
    Normal,
    /// Rolling upgrade in progress. Does not block scaling.
    Upgrade,
    Scale,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdStatus {
    /// Whether the member view below was refreshed from PD since the last write.
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub phase: MemberPhase,
    /// Keyed by pod name.
    #[serde(default)]
    pub members: BTreeMap<String, PdMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<PdMember>,
    /// Members the failover logic gave up on, keyed by pod name.
    #[serde(default)]
    pub failure_members: BTreeMap<String, PdFailureMember>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub client_url: String,
    #[serde(default)]
    pub health: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdFailureMember {
    pub pod_name: String,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub pvc_uid: String,
    #[serde(default)]
    pub member_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct TikvStatus {
    /// Keyed by store id.
    #[serde(default)]
    pub stores: BTreeMap<String, TikvStore>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TikvStore {
    pub id: String,
    pub pod_name: String,
    #[serde(default)]
    pub state: StoreState,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub enum StoreState {
    #[default]
    Up,
    Down,
    Offline,
    Tombstone,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct TidbStatus {
    /// Keyed by member name.
    #[serde(default)]
    pub members: BTreeMap<String, TidbMember>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct TidbMember {
    pub name: String,
    #[serde(default)]
    pub health: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatefulComponentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_set: Option<StatefulSetStatus>,
}

impl StatefulComponentStatus {
    pub fn running_replicas(&self) -> i32 {
        self.stateful_set.as_ref().map_or(0, |s| s.replicas)
    }
}

impl TikvStatus {
    /// Stores that still hold or serve data. Tombstones are gone for good.
    pub fn live_stores(&self) -> usize {
        self.stores
            .values()
            .filter(|s| s.state != StoreState::Tombstone)
            .count()
    }
}

impl TidbStatus {
    pub fn healthy_members(&self) -> usize {
        self.members.values().filter(|m| m.health).count()
    }
}

impl TidbCluster {
    pub fn pd_status(&self) -> Option<&PdStatus> {
        self.status.as_ref().map(|s| &s.pd)
    }

    pub fn is_tls_cluster_enabled(&self) -> bool {
        self.spec.tls_cluster.as_ref().is_some_and(|t| t.enabled)
    }

    pub fn pd_upgrading(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.pd.phase == MemberPhase::Upgrade)
    }
}
