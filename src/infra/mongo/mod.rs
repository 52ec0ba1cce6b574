pub mod api;
pub mod types;

pub use api::*;
pub use types::*;
