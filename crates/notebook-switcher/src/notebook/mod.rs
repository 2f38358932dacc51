pub mod names;
pub mod transform;
