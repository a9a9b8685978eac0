use std::cmp::Ordering;

use chrono::Utc;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use tracing::{error, info, instrument, warn};

use crate::{
    api::v1::tidbcluster::{PdStatus, TidbCluster},
    controller::Dependencies,
};

use super::{
    pvc::{add_defer_deleting_anno, delete_defer_deleting_pvcs, resolve_pvcs_from_pod, ReclaimOutcome},
    utils::{pd_pod_name, replicas, scale_one, set_replicas, MemberType},
    Error, ScaleDirection,
};

/// Moves the PD group one member at a time, keeping PD membership and PVCs
/// in step with the StatefulSet.
#[derive(Clone)]
pub struct PdScaler {
    deps: Dependencies,
}

impl PdScaler {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }

    /// Takes one step from `old_set` towards `new_set`. `new_set` ends up at
    /// the committed replica count, or at `old_set`'s on any failure.
    pub async fn scale(
        &self,
        tc: &TidbCluster,
        old_set: &StatefulSet,
        new_set: &mut StatefulSet,
    ) -> Result<(), Error> {
        let step = scale_one(old_set, new_set);
        set_replicas(new_set, replicas(old_set));
        let committed = match step.direction {
            Ordering::Greater => self.scale_out_one(tc, old_set, step.ordinal, step.replicas).await?,
            Ordering::Less => self.scale_in_one(tc, old_set, step.ordinal, step.replicas).await?,
            Ordering::Equal => return Ok(()),
        };
        set_replicas(new_set, committed);
        Ok(())
    }

    /// Adds the member at ordinal `old` and returns the replica count to commit.
    pub async fn scale_out(
        &self,
        tc: &TidbCluster,
        old_set: &StatefulSet,
        new_set: &StatefulSet,
    ) -> Result<i32, Error> {
        let step = scale_one(old_set, new_set);
        if step.direction != Ordering::Greater {
            return Err(invalid_step(old_set, new_set, ScaleDirection::Out));
        }
        self.scale_out_one(tc, old_set, step.ordinal, step.replicas).await
    }

    /// Removes the member at ordinal `old - 1` and returns the replica count to commit.
    pub async fn scale_in(
        &self,
        tc: &TidbCluster,
        old_set: &StatefulSet,
        new_set: &StatefulSet,
    ) -> Result<i32, Error> {
        let step = scale_one(old_set, new_set);
        if step.direction != Ordering::Less {
            return Err(invalid_step(old_set, new_set, ScaleDirection::In));
        }
        self.scale_in_one(tc, old_set, step.ordinal, step.replicas).await
    }

    /// True when nothing else in the cluster still runs against PD, so the
    /// PD group may be driven to zero.
    pub fn pre_check_up_members(&self, tc: &TidbCluster, pod_name: &str) -> bool {
        let up = up_components(tc);
        if up != 0 {
            error!(
                "Can't scale in PD of TidbCluster {}/{} to zero while {} members of other components are up, {} is kept",
                tc.namespace().unwrap_or_default(),
                tc.name_any(),
                up,
                pod_name
            );
            return false;
        }
        true
    }

    #[instrument(skip(self, tc, old_set), fields(cluster = %tc.name_any()))]
    async fn scale_out_one(
        &self,
        tc: &TidbCluster,
        old_set: &StatefulSet,
        ordinal: i32,
        target: i32,
    ) -> Result<i32, Error> {
        let ns = tc.namespace().unwrap_or("default".to_string());
        let tc_name = tc.name_any();
        let pd = synced_pd_status(tc, ScaleDirection::Out)?;

        info!(
            "Scaling out pd statefulset {}/{}, ordinal: {} (replicas: {})",
            ns,
            old_set.name_any(),
            ordinal,
            target
        );
        if tc.pd_upgrading() {
            info!("PD of TidbCluster {}/{} is upgrading, scaling out anyway", ns, tc_name);
        }

        if pd.failure_members.is_empty() {
            let total = replicas(old_set);
            let healthy = (0..total)
                .filter(|i| {
                    pd.members
                        .get(&pd_pod_name(&tc_name, *i))
                        .is_some_and(|m| m.health)
                })
                .count();
            if healthy < total as usize {
                warn!("Only {}/{} PD members of {}/{} are healthy", healthy, total, ns, tc_name);
                return Err(Error::MembersUnhealthy {
                    namespace: ns,
                    name: tc_name,
                    healthy,
                    total,
                });
            }
        } else {
            info!(
                "TidbCluster {}/{} has failed PD members {:?}, scaling out to replace them",
                ns,
                tc_name,
                pd.failure_members.keys().collect::<Vec<_>>()
            );
        }

        let outcome = delete_defer_deleting_pvcs(
            tc,
            MemberType::Pd,
            ordinal,
            self.deps.pvc_lister.as_ref(),
            self.deps.pvc_control.as_ref(),
            &self.deps.config.defer_deleting_annotation,
        )
        .await?;
        if let ReclaimOutcome::InUse(kept) = &outcome {
            info!("Reusing unmarked PVCs {:?} for ordinal {}", kept, ordinal);
        }

        Ok(target)
    }

    #[instrument(skip(self, tc, old_set), fields(cluster = %tc.name_any()))]
    async fn scale_in_one(
        &self,
        tc: &TidbCluster,
        old_set: &StatefulSet,
        ordinal: i32,
        target: i32,
    ) -> Result<i32, Error> {
        let ns = tc.namespace().unwrap_or("default".to_string());
        let tc_name = tc.name_any();
        let member_name = pd_pod_name(&tc_name, ordinal);
        let pd = synced_pd_status(tc, ScaleDirection::In)?;

        info!(
            "Scaling in pd statefulset {}/{}, ordinal: {} (replicas: {})",
            ns,
            old_set.name_any(),
            ordinal,
            target
        );
        if tc.pd_upgrading() {
            info!("PD of TidbCluster {}/{} is upgrading, scaling in anyway", ns, tc_name);
        }

        if (tc.spec.pd.replicas == 0 || target == 0) && !self.pre_check_up_members(tc, &member_name) {
            return Err(Error::DependencyBlocked {
                namespace: ns,
                name: tc_name,
                pod_name: member_name,
                up_components: up_components(tc),
            });
        }

        let pd_client =
            self.deps
                .pd_control
                .pd_client(&ns, &tc_name, tc.is_tls_cluster_enabled());
        let leader = pd_client
            .get_pd_leader()
            .await
            .map_err(|source| Error::LeaderQueryFailed {
                namespace: ns.clone(),
                name: tc_name.clone(),
                source,
            })?;

        if leader.name == member_name {
            match self.transfer_target(&tc_name, pd, replicas(old_set), ordinal) {
                Some(to) => {
                    pd_client
                        .transfer_pd_leader(&to)
                        .await
                        .map_err(|source| Error::LeaderTransferFailed {
                            namespace: ns.clone(),
                            name: tc_name.clone(),
                            from: member_name.clone(),
                            to: to.clone(),
                            source,
                        })?;
                    info!("Transferred PD leader of {}/{} from {} to {}", ns, tc_name, member_name, to);
                }
                None => {
                    warn!(
                        "PD leader {} of {}/{} is the last member, nothing to hand leadership to",
                        member_name, ns, tc_name
                    );
                }
            }
        }

        pd_client
            .delete_member(&member_name)
            .await
            .map_err(|source| {
                error!("Failed to delete PD member {} of {}/{}: {}", member_name, ns, tc_name, source);
                Error::MemberDeleteFailed {
                    namespace: ns.clone(),
                    name: tc_name.clone(),
                    member: member_name.clone(),
                    source,
                }
            })?;
        info!("Deleted PD member {} of {}/{}", member_name, ns, tc_name);

        let pod = self
            .deps
            .pod_lister
            .get_pod(&ns, &member_name)
            .ok_or_else(|| Error::StorageInconsistent {
                namespace: ns.clone(),
                name: tc_name.clone(),
                pod_name: member_name.clone(),
                reason: "pod not found in cache".to_string(),
            })?;
        let pvcs = resolve_pvcs_from_pod(tc, &pod, self.deps.pvc_lister.as_ref())?;

        let now = Utc::now();
        for pvc in pvcs {
            add_defer_deleting_anno(
                &pvc,
                self.deps.pvc_control.as_ref(),
                &self.deps.config.defer_deleting_annotation,
                now,
            )
            .await?;
        }

        Ok(target)
    }

    /// Member to hand leadership to when `ordinal` leaves. The lowest healthy
    /// ordinal wins, otherwise the lowest remaining one. `None` only when
    /// `ordinal` is the last member.
    fn transfer_target(
        &self,
        tc_name: &str,
        pd: &PdStatus,
        total: i32,
        ordinal: i32,
    ) -> Option<String> {
        let mut peers = (0..total)
            .filter(|i| *i != ordinal)
            .map(|i| pd_pod_name(tc_name, i))
            .peekable();
        let lowest = peers.peek().cloned()?;
        if !self.deps.config.transfer_leader_prefer_healthy {
            return Some(lowest);
        }
        Some(
            peers
                .find(|name| pd.members.get(name).is_some_and(|m| m.health))
                .unwrap_or(lowest),
        )
    }
}

fn synced_pd_status(tc: &TidbCluster, direction: ScaleDirection) -> Result<&PdStatus, Error> {
    match tc.pd_status() {
        Some(pd) if pd.synced => Ok(pd),
        _ => Err(Error::NotSynced {
            namespace: tc.namespace().unwrap_or("default".to_string()),
            name: tc.name_any(),
            direction,
        }),
    }
}

/// Live TiKV and TiFlash stores, healthy TiDB members and running TiCDC and
/// Pump replicas.
fn up_components(tc: &TidbCluster) -> usize {
    let Some(status) = tc.status.as_ref() else {
        return 0;
    };
    status.tikv.live_stores()
        + status.tiflash.live_stores()
        + status.tidb.healthy_members()
        + status.ticdc.running_replicas().max(0) as usize
        + status.pump.running_replicas().max(0) as usize
}

fn invalid_step(old_set: &StatefulSet, new_set: &StatefulSet, direction: ScaleDirection) -> Error {
    Error::InvalidScaleStep {
        namespace: old_set.namespace().unwrap_or("default".to_string()),
        name: old_set.name_any(),
        old: replicas(old_set),
        new: replicas(new_set),
        direction,
    }
}
