pub mod connection_manager;
pub mod database; // Engine adapters and the adapter registry
pub mod execution_service;
pub mod llm_service;
pub mod schema_service;

pub use connection_manager::*;
pub use execution_service::*;
pub use llm_service::*;
pub use schema_service::*;
