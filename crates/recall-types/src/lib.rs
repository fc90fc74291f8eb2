//! # recall-types
//!
//! Shared data model for the recall workspace.
//!
//! Defines the [`Item`] record that callers hand to the ingestion
//! pipeline and the text-extraction rules for structured content.

pub mod item;

pub use item::{Item, ItemContent, DEFAULT_CONTENT_FIELD};
