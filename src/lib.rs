//! Annotweave: a formatting-faithful source rewriter.
//!
//! Given a parsed module and a configuration for each tool annotation site,
//! annotweave rewrites the annotation literals so they carry `name`,
//! `description` and `parameters`, while every other byte of the document
//! stays as the author wrote it.
//!
//! The pipeline is split the same way the modules are:
//! - [`syntax`]: concrete syntax tree with trivia, and its parser.
//! - [`rewrite`]: field synthesis, literal merging and tree rebuilding.
//! - [`commit`]: per-document rewriting against a [`commit::SourceHost`].
//! - [`config`]: configuration records and rewrite plans.

pub use crate::diagnostics::{ErrorContext, ErrorKind, RewriteError};
pub use crate::syntax::Span;

pub use crate::commit::{DocumentId, ModifyReport, SourceHost, SourceModifier};
pub use crate::config::{RewritePlan, ToolConfig};
pub use crate::rewrite::{compute_replacements, rebuild, rewrite_module, SiteConfigs};
pub use crate::syntax::{parse_expression, parse_module, SyntaxTree};

pub mod cli;
pub mod commit;
pub mod config;
pub mod diagnostics;
pub mod rewrite;
pub mod syntax;
