//! Runtime wiring: the concrete async-runtime spawner and the top-level
//! `Runtime` handle that owns every component.

pub mod handle;
pub mod tokio_spawner;

pub use handle::{Runtime, RuntimeHealth};
pub use tokio_spawner::TokioSpawner;
