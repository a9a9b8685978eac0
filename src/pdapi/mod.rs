//! Ports onto the PD control-plane API.
//!
//! Only the calls the member scaler needs are modelled here. Each call is a
//! single request/response; transport, TLS and timeouts belong to the
//! implementation behind [`PdClient`].

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdAction {
    GetLeader,
    TransferLeader,
    DeleteMember,
}

impl Display for PdAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PdAction::GetLeader => "GetPDLeader",
            PdAction::TransferLeader => "TransferPDLeader",
            PdAction::DeleteMember => "DeleteMember",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{action} request to {url} failed: {message}")]
    Request {
        action: PdAction,
        url: String,
        message: String,
    },
    #[error("{action} returned status {status}: {body}")]
    Status {
        action: PdAction,
        status: u16,
        body: String,
    },
    #[error("member {0} not found in pd cluster")]
    MemberNotFound(String),
}

/// A PD member as reported by the leader endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub name: String,
    #[serde(default)]
    pub member_id: u64,
    #[serde(default)]
    pub client_urls: Vec<String>,
}

#[async_trait]
pub trait PdClient: Send + Sync {
    async fn get_pd_leader(&self) -> Result<MemberInfo, Error>;
    async fn transfer_pd_leader(&self, member_name: &str) -> Result<(), Error>;
    async fn delete_member(&self, member_name: &str) -> Result<(), Error>;
}

/// Hands out a client for the PD group of one cluster.
pub trait PdControl: Send + Sync {
    fn pd_client(&self, namespace: &str, tc_name: &str, tls_enabled: bool) -> Arc<dyn PdClient>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_deserializes_from_pd_json() {
        let raw = r#"{"name":"demo-pd-0","memberId":42,"clientUrls":["http://demo-pd-0:2379"]}"#;
        let leader: MemberInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(leader.name, "demo-pd-0");
        assert_eq!(leader.member_id, 42);
    }
}
