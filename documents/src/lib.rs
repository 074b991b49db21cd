//! Resolution of the JSON documents served to the assistant front end.
//!
//! Two kinds of documents exist, the report context and the tools prompt.
//! Both are resolved through the same tiers, in order:
//!
//! 1. the relational store, when one is configured and an id is known
//! 2. the local JSON file configured for the kind
//! 3. the built-in default
//!
//! Failures in the first two tiers are logged and never reach the caller.

pub mod config;
mod defaults;
mod document;
mod file;
pub mod metrics_defs;
mod resolver;
pub mod store;

pub use document::{
    ContextDocument, Document, DocumentFields, DocumentKind, DocumentLayout, FieldNames,
    ToolsPromptDocument,
};
pub use file::FileError;
pub use resolver::{ConfigResolver, Tier};
pub use store::{DocumentStore, StoreError};
