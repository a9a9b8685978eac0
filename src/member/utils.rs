use std::{cmp::Ordering, collections::BTreeMap, fmt::Display};

use k8s_openapi::api::apps::v1::StatefulSet;

use crate::api::constants::{LABEL_COMPONENT, LABEL_INSTANCE, LABEL_POD_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Pd,
    Tikv,
    Tiflash,
}

impl Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberType::Pd => "pd",
            MemberType::Tikv => "tikv",
            MemberType::Tiflash => "tiflash",
        };
        f.write_str(s)
    }
}

pub fn ordinal_pod_name(member_type: MemberType, tc_name: &str, ordinal: i32) -> String {
    format!("{tc_name}-{member_type}-{ordinal}")
}

pub fn ordinal_pvc_name(member_type: MemberType, set_name: &str, ordinal: i32) -> String {
    format!("{member_type}-{set_name}-{ordinal}")
}

/// Pod name, and PD member name, of the PD member at `ordinal`.
pub fn pd_pod_name(tc_name: &str, ordinal: i32) -> String {
    ordinal_pod_name(MemberType::Pd, tc_name, ordinal)
}

/// Labels selecting the `member_type` PVCs claimed by the pod at `ordinal`.
pub fn ordinal_pvc_selector(
    member_type: MemberType,
    tc_name: &str,
    ordinal: i32,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_INSTANCE.clone(), tc_name.to_string()),
        (LABEL_COMPONENT.clone(), member_type.to_string()),
        (
            LABEL_POD_NAME.clone(),
            ordinal_pod_name(member_type, tc_name, ordinal),
        ),
    ])
}

/// Spec replicas, with the apiserver's default of 1 when unset.
pub fn replicas(set: &StatefulSet) -> i32 {
    set.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

pub fn set_replicas(set: &mut StatefulSet, replicas: i32) {
    set.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
}

/// One step from `old` towards `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleStep {
    pub direction: Ordering,
    /// Ordinal that is added (scale out) or removed (scale in).
    pub ordinal: i32,
    /// Replicas once the step is committed.
    pub replicas: i32,
}

pub fn scale_one(old: &StatefulSet, new: &StatefulSet) -> ScaleStep {
    let old_replicas = replicas(old);
    let direction = replicas(new).cmp(&old_replicas);
    match direction {
        Ordering::Greater => ScaleStep {
            direction,
            ordinal: old_replicas,
            replicas: old_replicas + 1,
        },
        Ordering::Less => ScaleStep {
            direction,
            ordinal: old_replicas - 1,
            replicas: old_replicas - 1,
        },
        Ordering::Equal => ScaleStep {
            direction,
            ordinal: -1,
            replicas: old_replicas,
        },
    }
}
