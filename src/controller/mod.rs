pub mod dependencies;
pub mod pod;
pub mod pvc;

pub use dependencies::Dependencies;
pub use pod::PodLister;
pub use pvc::{is_not_found, KubePvcControl, PvcControl, PvcLister};
