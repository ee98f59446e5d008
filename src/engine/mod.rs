//! Engine boundary
//!
//! An [`Engine`] owns the accumulated text of a conversation and performs
//! constrained generation against a [`Grammar`]. The orchestrator makes a
//! single `run` call per extraction and reads the result back from the
//! transcript.

pub mod scripted;

use crate::error::Result;
use crate::grammar::Grammar;

pub use scripted::ScriptedEngine;

/// A constrained-decoding backend
pub trait Engine {
    /// Everything generated or supplied so far
    fn transcript(&self) -> &str;

    /// Generate text matching `grammar` and append it to the transcript
    fn run(&mut self, grammar: &Grammar<'_>) -> Result<()>;
}
