//! # Builders
//!
//! Fluent configuration for the engine.
//!
//! - [`processor_builder`] - builder for [`crate::ContentProcessor`]

pub mod processor_builder;

pub use processor_builder::ProcessorBuilder;
