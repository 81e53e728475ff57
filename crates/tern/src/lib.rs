//! Tern: the semantic-analysis middle-end of the Tern compiler.
//!
//! This crate wires the analysis passes together: name binding
//! (`tern-bind`), bidirectional type checking (`tern-check`) and CPS
//! lowering (`tern-emit`), over the shared AST (`tern-ast`), type world
//! (`tern-types`) and IR world (`tern-ir`).
//!
//! The entry point is [`analyze_module`]: it consumes an already-parsed
//! module and produces per-node types, per-node IR definitions and a
//! deterministic diagnostic stream.

pub mod compiler;

pub use compiler::{Analysis, AnalyzerConfig, analyze_module};
