//! Deferred deletion of member PVCs.
//!
//! Scaling in never deletes storage. It only annotates the PVCs of the
//! removed member with the time they became reclaimable. The next scale out
//! at the same ordinal deletes annotated PVCs right before the ordinal is
//! claimed again, so between the two an operator can still rescue the data.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::ResourceExt;
use tracing::{info, warn};

use crate::{
    api::v1::tidbcluster::TidbCluster,
    controller::{is_not_found, pod::claim_names, PvcControl, PvcLister},
};

use super::{
    utils::{ordinal_pvc_selector, MemberType},
    Error,
};

/// Timestamp a PVC was marked reclaimable at, if it carries the mark.
pub fn defer_deleting_since(pvc: &PersistentVolumeClaim, key: &str) -> Option<DateTime<Utc>> {
    pvc.annotations()
        .get(key)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

pub fn is_defer_deleting(pvc: &PersistentVolumeClaim, key: &str) -> bool {
    pvc.annotations().contains_key(key)
}

/// Sets the mark unless one is already present. Returns whether anything changed.
pub fn mark_defer_deleting(pvc: &mut PersistentVolumeClaim, key: &str, now: DateTime<Utc>) -> bool {
    if is_defer_deleting(pvc, key) {
        return false;
    }
    pvc.annotations_mut().insert(
        key.to_string(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    true
}

/// What a scale out found at the ordinal it is about to claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// No PVC in the cache: the ordinal was never used.
    NotFound,
    /// PVCs exist but none is marked; they are kept and reused.
    InUse(Vec<String>),
    /// Names of the marked PVCs that were deleted.
    Reclaimed(Vec<String>),
}

/// Deletes every marked PVC bound to `ordinal`. Unmarked PVCs are left alone.
pub async fn delete_defer_deleting_pvcs(
    tc: &TidbCluster,
    member_type: MemberType,
    ordinal: i32,
    lister: &dyn PvcLister,
    control: &dyn PvcControl,
    key: &str,
) -> Result<ReclaimOutcome, Error> {
    let ns = tc.namespace().unwrap_or("default".to_string());
    let selector = ordinal_pvc_selector(member_type, &tc.name_any(), ordinal);
    let pvcs = lister.list_pvcs(&ns, &selector);
    if pvcs.is_empty() {
        info!(
            "No PVC found for {} ordinal {} of TidbCluster {}/{}",
            member_type,
            ordinal,
            ns,
            tc.name_any()
        );
        return Ok(ReclaimOutcome::NotFound);
    }

    let mut reclaimed = Vec::new();
    let mut kept = Vec::new();
    for pvc in pvcs {
        let name = pvc.name_any();
        let Some(since) = pvc.annotations().get(key).cloned() else {
            kept.push(name);
            continue;
        };
        match control.delete_pvc(&pvc).await {
            Ok(()) => {
                info!("Reclaimed PVC {}/{} marked for deletion at {}", ns, name, since);
            }
            Err(e) if is_not_found(&e) => {
                info!("PVC {}/{} is already gone", ns, name);
            }
            Err(source) => {
                return Err(Error::VolumeReclaimFailed {
                    namespace: ns,
                    pvc: name,
                    source,
                })
            }
        }
        reclaimed.push(name);
    }

    if reclaimed.is_empty() {
        Ok(ReclaimOutcome::InUse(kept))
    } else {
        Ok(ReclaimOutcome::Reclaimed(reclaimed))
    }
}

/// PVCs backing `pod`, resolved through the PVC cache. Fails unless every
/// declared claim resolves and there is at least one.
pub fn resolve_pvcs_from_pod(
    tc: &TidbCluster,
    pod: &Pod,
    lister: &dyn PvcLister,
) -> Result<Vec<Arc<PersistentVolumeClaim>>, Error> {
    let ns = pod.namespace().unwrap_or("default".to_string());
    let inconsistent = |reason: String| Error::StorageInconsistent {
        namespace: tc.namespace().unwrap_or("default".to_string()),
        name: tc.name_any(),
        pod_name: pod.name_any(),
        reason,
    };

    let claims = claim_names(pod);
    if claims.is_empty() {
        return Err(inconsistent("pod declares no PVC".to_string()));
    }
    claims
        .into_iter()
        .map(|claim| {
            lister
                .get_pvc(&ns, &claim)
                .ok_or_else(|| inconsistent(format!("PVC {ns}/{claim} not found in cache")))
        })
        .collect()
}

/// Marks `pvc` reclaimable through `control`. Already marked PVCs are not written.
pub async fn add_defer_deleting_anno(
    pvc: &PersistentVolumeClaim,
    control: &dyn PvcControl,
    key: &str,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let ns = pvc.namespace().unwrap_or("default".to_string());
    let mut marked = pvc.clone();
    if !mark_defer_deleting(&mut marked, key, now) {
        warn!(
            "PVC {}/{} already marked for deletion at {:?}",
            ns,
            pvc.name_any(),
            defer_deleting_since(pvc, key)
        );
        return Ok(());
    }
    control
        .update_pvc(&marked)
        .await
        .map_err(|source| Error::VolumeMarkFailed {
            namespace: ns.clone(),
            pvc: pvc.name_any(),
            source,
        })?;
    info!("Marked PVC {}/{} for deferred deletion", ns, pvc.name_any());
    Ok(())
}
