use std::fmt::Display;

use thiserror::Error;

use crate::pdapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Out,
    In,
}

impl Display for ScaleDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleDirection::Out => f.write_str("out"),
            ScaleDirection::In => f.write_str("in"),
        }
    }
}

/// Coarse classification callers use to pick a requeue policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotSynced,
    NotReady,
    DependencyBlocked,
    RemoteCallFailed,
    StorageInconsistent,
    StorageUpdateFailed,
    InvalidRequest,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("TidbCluster {namespace}/{name}: pd status sync failed, can't scale {direction} now")]
    NotSynced {
        namespace: String,
        name: String,
        direction: ScaleDirection,
    },
    #[error("StatefulSet {namespace}/{name}: replicas {old} -> {new} is not a scale {direction}")]
    InvalidScaleStep {
        namespace: String,
        name: String,
        old: i32,
        new: i32,
        direction: ScaleDirection,
    },
    #[error("TidbCluster {namespace}/{name}: pd {healthy}/{total} members are healthy, can't scale out now")]
    MembersUnhealthy {
        namespace: String,
        name: String,
        healthy: usize,
        total: i32,
    },
    #[error("TidbCluster {namespace}/{name}: can't scale in {pod_name}, {up_components} dependent members still use pd")]
    DependencyBlocked {
        namespace: String,
        name: String,
        pod_name: String,
        up_components: usize,
    },
    #[error("TidbCluster {namespace}/{name}: failed to get pd leader: {source}")]
    LeaderQueryFailed {
        namespace: String,
        name: String,
        #[source]
        source: pdapi::Error,
    },
    #[error("TidbCluster {namespace}/{name}: failed to transfer pd leader from {from} to {to}: {source}")]
    LeaderTransferFailed {
        namespace: String,
        name: String,
        from: String,
        to: String,
        #[source]
        source: pdapi::Error,
    },
    #[error("TidbCluster {namespace}/{name}: failed to delete pd member {member}: {source}")]
    MemberDeleteFailed {
        namespace: String,
        name: String,
        member: String,
        #[source]
        source: pdapi::Error,
    },
    #[error("TidbCluster {namespace}/{name}: storage of {pod_name} can't be located: {reason}")]
    StorageInconsistent {
        namespace: String,
        name: String,
        pod_name: String,
        reason: String,
    },
    #[error("failed to mark PVC {namespace}/{pvc} for deferred deletion: {source}")]
    VolumeMarkFailed {
        namespace: String,
        pvc: String,
        #[source]
        source: kube::Error,
    },
    #[error("failed to delete defer-deleting PVC {namespace}/{pvc}: {source}")]
    VolumeReclaimFailed {
        namespace: String,
        pvc: String,
        #[source]
        source: kube::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotSynced { .. } => ErrorKind::NotSynced,
            Error::InvalidScaleStep { .. } => ErrorKind::InvalidRequest,
            Error::MembersUnhealthy { .. } => ErrorKind::NotReady,
            Error::DependencyBlocked { .. } => ErrorKind::DependencyBlocked,
            Error::LeaderQueryFailed { .. }
            | Error::LeaderTransferFailed { .. }
            | Error::MemberDeleteFailed { .. } => ErrorKind::RemoteCallFailed,
            Error::StorageInconsistent { .. } => ErrorKind::StorageInconsistent,
            Error::VolumeMarkFailed { .. } | Error::VolumeReclaimFailed { .. } => {
                ErrorKind::StorageUpdateFailed
            }
        }
    }

    /// Whether re-driving the same call later can succeed without anyone
    /// fixing state by hand.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::StorageInconsistent | ErrorKind::InvalidRequest
        )
    }
}
