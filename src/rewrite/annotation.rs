//! Annotation rewriting: picks the merge strategy for one annotation site.

use tracing::debug;

use crate::{
    config::ToolConfig,
    rewrite::{merge::merge_fields, synth::synthesize_mapping},
    syntax::{Annotation, Mapping, NameReference, Token},
    RewriteError,
};

/// Shape of an annotation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteShape {
    /// `@ai:Tool`
    NoLiteral,
    /// `@ai:Tool {}`
    EmptyLiteral,
    /// `@ai:Tool {name: "x"}`
    WithFields,
}

impl SiteShape {
    pub fn of(annotation: &Annotation) -> Self {
        match &annotation.value {
            None => Self::NoLiteral,
            Some(mapping) if mapping.fields.is_empty() => Self::EmptyLiteral,
            Some(_) => Self::WithFields,
        }
    }
}

/// Computes the replacement for one annotation. The result keeps the id and
/// span of the original node.
pub fn rewrite_annotation(
    annotation: &Annotation,
    config: &ToolConfig,
) -> Result<Annotation, RewriteError> {
    let shape = SiteShape::of(annotation);
    debug!(annotation = %annotation.id, reference = %annotation.reference.name(), ?shape, "rewriting annotation");

    match (&annotation.value, shape) {
        (Some(mapping), SiteShape::WithFields) => {
            Ok(annotation.with_value(merge_fields(mapping, config)?))
        }
        (Some(mapping), _) => {
            let synthesized = synthesize_mapping(config)?;
            Ok(annotation.with_value(mapping.with_fields(synthesized.fields)))
        }
        (None, _) => without_literal(annotation, config),
    }
}

/// `@ref` becomes `@ref {...}`. The reference loses its trivia, a single
/// space precedes the literal, and whatever trailed the reference (usually
/// the line break) now trails the closing brace.
fn without_literal(annotation: &Annotation, config: &ToolConfig) -> Result<Annotation, RewriteError> {
    let trailing = annotation.reference.last_token().trailing_trivia().to_string();
    let literal: Mapping = synthesize_mapping(config)?;
    let close_brace = literal.close_brace.clone().with_trailing_trivia(trailing);
    let literal = literal.with_close_brace(close_brace);

    let reference = match &annotation.reference {
        NameReference::Simple(identifier) => NameReference::Simple(spaced(identifier)),
        NameReference::Qualified {
            prefix,
            colon,
            identifier,
        } => NameReference::Qualified {
            prefix: prefix.without_trivia(),
            colon: colon.without_trivia(),
            identifier: spaced(identifier),
        },
    };

    Ok(annotation.with_value(literal).with_reference(reference))
}

fn spaced(identifier: &Token) -> Token {
    identifier.without_trivia().with_trailing_trivia(" ")
}
