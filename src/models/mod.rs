pub mod descriptor;
pub mod policy;

pub use descriptor::*;
pub use policy::*;
