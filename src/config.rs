use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::constants::ANN_PVC_DEFER_DELETING;

const ENV_PREFIX: &str = "PD_SCALER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: expected true or false, got {value:?}")]
    InvalidBool { var: String, value: String },
    #[error("invalid scaler configuration: {0}")]
    Invalid(#[from] garde::Report),
}

/// Tunables for the member scaler.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ScalerConfig {
    /// Annotation put on a PVC when its member is scaled in.
    #[garde(custom(qualified_name))]
    pub defer_deleting_annotation: String,
    /// Field manager recorded on PVC writes.
    #[garde(length(min = 1, max = 128))]
    pub field_manager: String,
    /// Hand PD leadership to the lowest healthy member before falling back to
    /// the lowest remaining one.
    #[garde(skip)]
    pub transfer_leader_prefer_healthy: bool,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            defer_deleting_annotation: ANN_PVC_DEFER_DELETING.clone(),
            field_manager: "pd-member-scaler".to_string(),
            transfer_leader_prefer_healthy: true,
        }
    }
}

impl ScalerConfig {
    /// Defaults overridden by `PD_SCALER_*` environment variables, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();
        if let Some(v) = var("DEFER_DELETING_ANNOTATION") {
            config.defer_deleting_annotation = v;
        }
        if let Some(v) = var("FIELD_MANAGER") {
            config.field_manager = v;
        }
        if let Some(v) = var("TRANSFER_LEADER_PREFER_HEALTHY") {
            config.transfer_leader_prefer_healthy = match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        var: format!("{ENV_PREFIX}TRANSFER_LEADER_PREFER_HEALTHY"),
                        value: v,
                    })
                }
            };
        }
        config.validate()?;
        Ok(config)
    }
}

// prefix/name, as kubernetes expects for annotation keys
fn qualified_name(value: &str, _ctx: &()) -> garde::Result {
    match value.split_once('/') {
        Some((prefix, name))
            if !prefix.is_empty()
                && !name.is_empty()
                && name.len() <= 63
                && !name.contains('/') =>
        {
            Ok(())
        }
        _ => Err(garde::Error::new("must be a qualified name of the form prefix/name")),
    }
}
