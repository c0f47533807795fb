//! Builders that wire C1-C8 into a top-level [`crate::runtime::Runtime`]
//! from a [`crate::config::RuntimeConfig`].

pub mod runtime_builder;

pub use runtime_builder::build_runtime;
