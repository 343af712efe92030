//! Literal merging for annotations that already carry fields.
//!
//! The merged literal is assembled as text from the original tokens and then
//! re-parsed. Existing fields keep their text, trivia and order; only the
//! missing reserved fields are appended after them.

use std::collections::HashMap;

use tracing::trace;

use crate::{
    config::ToolConfig,
    rewrite::synth::{reserved_value, synthesize_field, RESERVED_FIELDS},
    rewrite_err,
    syntax::{
        parse_mapping,
        trivia::{ends_with_line_break, has_comment, indentation_of, strip_last_line_break},
        Field, Mapping, ToSource, Token,
    },
    RewriteError,
};

/// One slot of the field index: the last field seen for a key, and the
/// separator written before the slot's first occurrence.
struct Slot<'a> {
    key: String,
    field: &'a Field,
    separator: Option<&'a Token>,
}

/// Indexes fields by key in insertion order; later duplicates replace the
/// field but keep the slot.
fn index_fields(mapping: &Mapping) -> Result<Vec<Slot<'_>>, RewriteError> {
    let mut slots: Vec<Slot> = Vec::with_capacity(mapping.fields.len());
    let mut positions = HashMap::new();

    for (index, field) in mapping.fields.iter().enumerate() {
        let key = field.key().ok_or_else(|| {
            rewrite_err!(
                UnsupportedSiteShape,
                format!("a {} cannot be merged with tool configuration", field.kind_name())
            )
            .with_help("use plain `key: value` fields in the annotation")
        })?;

        match positions.get(&key) {
            Some(&position) => {
                let slot: &mut Slot = &mut slots[position];
                slot.field = field;
            }
            None => {
                positions.insert(key.clone(), slots.len());
                slots.push(Slot {
                    key,
                    field,
                    separator: mapping.fields.separator_before(index),
                });
            }
        }
    }
    Ok(slots)
}

/// Splits a field's text into its body and the trailing trivia of its last
/// token.
fn split_trailing(field: &Field) -> (String, String) {
    let text = field.source_text();
    let trailing_len = field.last_token().trailing_trivia().len();
    let (body, trailing) = text.split_at(text.len() - trailing_len);
    (body.to_string(), trailing.to_string())
}

/// Merges the configuration into a literal with at least one field.
pub fn merge_fields(mapping: &Mapping, config: &ToolConfig) -> Result<Mapping, RewriteError> {
    let slots = index_fields(mapping)?;
    let last = mapping
        .fields
        .last()
        .ok_or_else(|| rewrite_err!(Internal, "cannot merge into an empty literal"))?;
    let last_text = last.source_text();
    let multiline = ends_with_line_break(&last_text);
    let indent = indentation_of(last.first_token().leading_trivia());

    let missing = RESERVED_FIELDS
        .iter()
        .filter(|key| !slots.iter().any(|slot| slot.key == **key))
        .map(|key| synthesize_field(key, reserved_value(config, key)))
        .collect::<Result<Vec<_>, _>>()?;
    trace!(existing = slots.len(), appended = missing.len(), multiline, "merging literal");

    let mut out = mapping.open_brace.source_text();
    // Trivia held back from the last field: a line comment that must follow
    // the next comma, and the text that goes before the closing brace.
    let mut comment: Option<String> = None;
    let mut line_break = String::new();
    let mut tail = String::new();

    for (index, slot) in slots.iter().enumerate() {
        if index > 0 {
            match slot.separator {
                Some(separator) => separator.write_source(&mut out),
                None => out.push(','),
            }
            if let Some(comment) = comment.take() {
                out.push_str(&comment);
            }
        }
        // With duplicate keys `last` may sit in an earlier slot.
        if !std::ptr::eq(slot.field, last) {
            slot.field.write_source(&mut out);
            continue;
        }

        let (body, trailing) = split_trailing(slot.field);
        out.push_str(&body);
        if !multiline {
            tail = trailing;
            continue;
        }
        let (rest, lb) = strip_last_line_break(&trailing).unwrap_or((trailing.as_str(), "\n"));
        line_break = lb.to_string();
        if has_comment(rest) {
            comment = Some(rest.to_string());
        } else {
            out.push_str(rest);
        }
    }

    for field in &missing {
        out.push(',');
        if multiline {
            if let Some(comment) = comment.take() {
                out.push_str(&comment);
            }
            out.push_str(&line_break);
            out.push_str(indent);
        }
        field.write_source(&mut out);
    }

    if multiline {
        if let Some(comment) = comment.take() {
            out.push_str(&comment);
        }
        out.push_str(&line_break);
    } else {
        out.push_str(&tail);
    }
    mapping.close_brace.write_source(&mut out);

    parse_mapping(&out).map_err(|e| {
        rewrite_err!(
            MalformedConfigValue,
            format!("merged literal does not parse: {}", e.message())
        )
        .caused_by(e)
    })
}
