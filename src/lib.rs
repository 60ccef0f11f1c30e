pub mod cli;
pub mod engine;
pub mod fault;
pub mod recorder;
pub mod request;
pub mod status;
pub mod validation;

pub use engine::{Engine, EngineError, TableSchema};
pub use request::{Context, Output, Reply, RequestHandle, RequestKind};
pub use status::{Status, StatusCode};
