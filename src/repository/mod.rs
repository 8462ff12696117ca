pub mod descriptor;

pub use descriptor::{decode_payload, DescriptorRepository};
