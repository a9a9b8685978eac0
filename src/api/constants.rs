use lazy_static::lazy_static;

lazy_static! {
    pub static ref TIDB_LABEL_PREFIX: String = "tidb.pingcap.com".to_string();
    pub static ref LABEL_INSTANCE: String = "app.kubernetes.io/instance".to_string();
    pub static ref LABEL_COMPONENT: String = "app.kubernetes.io/component".to_string();
    /// Label carried by every PVC naming the pod that claimed it.
    pub static ref LABEL_POD_NAME: String = format!("{}/pod-name", TIDB_LABEL_PREFIX.as_str());
    /// Annotation marking a PVC as reclaimable. The value is an RFC 3339 timestamp.
    pub static ref ANN_PVC_DEFER_DELETING: String =
        format!("{}/pvc-defer-deleting", TIDB_LABEL_PREFIX.as_str());
}
