pub mod config;
pub mod identity;
pub mod mongo;
pub mod routes;
pub mod store;

pub use config::*;
pub use identity::*;
pub use mongo::*;
pub use store::*;
