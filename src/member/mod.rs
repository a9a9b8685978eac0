//! Scaling of ordinally named member groups.

pub mod error;
pub mod pd_scaler;
pub mod pvc;
pub mod utils;

pub use error::{Error, ErrorKind, ScaleDirection};
pub use pd_scaler::PdScaler;
pub use utils::MemberType;
