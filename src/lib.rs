//! YAML Instructor
//!
//! Structured extraction from language models through constrained decoding.
//! A schema is compiled into a grammar that only admits YAML documents of
//! that schema; the engine generates under the grammar and the document is
//! parsed back into a typed value.
//!
//! ## Features
//!
//! - **Schema Derivation**: from `schemars::JsonSchema` types or JSON Schema documents
//! - **Lazy Grammars**: recursive and self-referential schemas compile to a finite rule set
//! - **Stable Layout**: indentation is memoized per `(type, depth)`
//! - **Pre-fill**: known top-level fields are written verbatim and never generated
//!
//! ## Pipeline
//!
//! ```text
//! Schema ──> Compiler ──> Grammar ──> Engine ──> transcript
//!                                                   │
//!        typed value <── parse <── strip comments <─┘ (between markers)
//! ```

pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod grammar;
pub mod schema;

pub use compile::{Compiler, Slot};
pub use config::ExtractConfig;
pub use engine::{Engine, ScriptedEngine};
pub use error::{ExtractError, Result};
pub use extract::{generate_object, Extractor, Prefill};
pub use grammar::{Fragment, Grammar, RuleId};
pub use schema::{FieldDescriptor, RecordSchema, ScalarKind, Schema, SchemaCatalog, SchemaNode};
