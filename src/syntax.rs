//! Syntax module for annotated module documents.
//!
//! Provides the concrete syntax tree, its parser, and [`SyntaxTree`], which
//! pairs a module root with the named source it was parsed from.

use std::sync::Arc;

use crate::diagnostics::{to_named_source, SourceArc};

pub mod parser;
pub mod tree;
pub mod trivia;

pub use parser::{parse_expression, parse_mapping, parse_module};
pub use tree::{
    Annotation, CallExpression, ComputedField, Expr, Field, FunctionDefinition, ListConstructor,
    Mapping, Member, Metadata, ModulePart, NameReference, NodeId, OtherDeclaration,
    SeparatedList, Span, SpecificField, SpreadField, ToSource, Token, TokenKind,
};

/// A parsed document: its name, original text and module root.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    name: String,
    source: SourceArc,
    root: Arc<ModulePart>,
}

impl SyntaxTree {
    pub(crate) fn new(name: &str, source: SourceArc, root: ModulePart) -> Self {
        Self {
            name: name.to_string(),
            source,
            root: Arc::new(root),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Arc<ModulePart> {
        &self.root
    }

    /// The text the tree was parsed from, used for error labels.
    pub fn named_source(&self) -> &SourceArc {
        &self.source
    }

    /// Renders the current root back to text.
    pub fn text(&self) -> String {
        self.root.source_text()
    }

    /// A tree for the same document with a new root.
    ///
    /// The named source is refreshed so diagnostics against the new tree
    /// point into its own text.
    pub fn modify_with(&self, root: ModulePart) -> Self {
        let root = Arc::new(root);
        let text = root.source_text();
        Self {
            name: self.name.clone(),
            source: to_named_source(&self.name, &text),
            root,
        }
    }
}
