pub mod constants;
pub mod v1;
