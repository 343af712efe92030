//! Field synthesis: the only place new source text is manufactured.

use crate::{
    config::ToolConfig,
    diagnostics::to_named_source,
    rewrite_err,
    syntax::{
        parse_expression, parse_mapping, trivia::has_comment, Expr, Field, Mapping,
        SpecificField, Span, Token, TokenKind,
    },
    RewriteError,
};

pub const NAME_FIELD: &str = "name";
pub const DESCRIPTION_FIELD: &str = "description";
pub const PARAMETERS_FIELD: &str = "parameters";

/// The keys every rewritten annotation ends up with, in insertion order.
pub const RESERVED_FIELDS: [&str; 3] = [NAME_FIELD, DESCRIPTION_FIELD, PARAMETERS_FIELD];

/// The value source a configuration provides for a reserved key.
pub(crate) fn reserved_value<'a>(config: &'a ToolConfig, key: &str) -> &'a str {
    match key {
        NAME_FIELD => &config.name,
        DESCRIPTION_FIELD => config.description_or_name(),
        _ => &config.parameter_schema,
    }
}

/// Renders `{name:<name>,description:<description>,parameters:<schema>}`.
///
/// Values are trimmed, so the literal never carries their outer whitespace.
pub fn synthesize_literal(config: &ToolConfig) -> String {
    format!(
        "{{{NAME_FIELD}:{},{DESCRIPTION_FIELD}:{},{PARAMETERS_FIELD}:{}}}",
        config.name.trim(),
        config.description_or_name().trim(),
        config.parameter_schema.trim()
    )
}

/// Parses [`synthesize_literal`] output into a literal node.
///
/// Each value is checked first so a failure names the configuration field
/// at fault.
pub fn synthesize_mapping(config: &ToolConfig) -> Result<Mapping, RewriteError> {
    config.validate()?;
    let literal = synthesize_literal(config);
    parse_mapping(&literal).map_err(|e| {
        let source = to_named_source("<tool configuration>", &literal);
        let span = e.context().span.unwrap_or_default();
        rewrite_err!(
            MalformedConfigValue,
            format!("synthesized literal does not parse: {}", e.message()),
            &source,
            span
        )
        .caused_by(e)
    })
}

/// Builds a `key:value` field with no trivia.
pub fn synthesize_field(key: &str, value_source: &str) -> Result<Field, RewriteError> {
    let value = parse_config_value(key, value_source)?;
    Ok(Field::Specific(SpecificField {
        key: Token::identifier(key),
        colon: Some(Token::punctuation(TokenKind::Colon)),
        value: Some(value),
    }))
}

/// Parses one configuration value as an expression without outer trivia.
///
/// Comments are rejected: a trailing line comment would swallow whatever is
/// spliced in after the value.
pub fn parse_config_value(field: &str, text: &str) -> Result<Expr, RewriteError> {
    let source = to_named_source(&format!("<config {field}>"), text);
    let trimmed = text.trim();
    let offset = text.len() - text.trim_start().len();

    let expr = parse_expression(trimmed).map_err(|e| {
        let span = e
            .context()
            .span
            .map(|s| Span {
                start: s.start + offset,
                end: s.end + offset,
            })
            .unwrap_or_default();
        rewrite_err!(
            MalformedConfigValue,
            format!("`{field}` is not a valid expression: {}", e.message()),
            &source,
            span
        )
        .caused_by(e)
    })?;

    if has_comment(expr.first_token().leading_trivia())
        || has_comment(expr.last_token().trailing_trivia())
    {
        let span = Span {
            start: offset,
            end: offset + trimmed.len(),
        };
        return Err(rewrite_err!(
            MalformedConfigValue,
            format!("`{field}` value must not contain comments"),
            &source,
            span
        ));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{syntax::ToSource, ErrorKind};

    fn config() -> ToolConfig {
        ToolConfig::new("\"sum\"", Some("\"adds\"".into()), "{}")
    }

    #[test]
    fn test_literal_has_no_whitespace() {
        assert_eq!(
            synthesize_literal(&config()),
            "{name:\"sum\",description:\"adds\",parameters:{}}"
        );
    }

    #[test]
    fn test_literal_falls_back_to_name() {
        let config = ToolConfig::new("\"sum\"", None, "{}");
        assert_eq!(
            synthesize_literal(&config),
            "{name:\"sum\",description:\"sum\",parameters:{}}"
        );
    }

    #[test]
    fn test_literal_drops_padding_around_values() {
        let config = ToolConfig::new("\"a\"\n", None, " {}\n");
        assert!(config.validate().is_ok());
        assert_eq!(
            synthesize_literal(&config),
            "{name:\"a\",description:\"a\",parameters:{}}"
        );
        let mapping = synthesize_mapping(&config).unwrap();
        assert_eq!(mapping.source_text(), synthesize_literal(&config));
    }

    #[test]
    fn test_field_is_rendered_without_trivia() {
        let field = synthesize_field("description", "  \"adds\"\n").unwrap();
        assert_eq!(field.source_text(), "description:\"adds\"");
        assert_eq!(field.key().as_deref(), Some("description"));
    }

    #[test]
    fn test_field_rejects_invalid_value() {
        let err = synthesize_field("parameters", "{a: }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedConfigValue);
        assert!(err.message().contains("parameters"));
    }

    #[test]
    fn test_field_rejects_trailing_comment() {
        let err = synthesize_field("name", "\"sum\" // tool").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedConfigValue);
    }

    #[test]
    fn test_value_must_be_a_single_expression() {
        assert!(parse_config_value("name", "\"a\", b: 1").is_err());
    }

    #[test]
    fn test_mapping_parses_all_three_fields() {
        let mapping = synthesize_mapping(&config()).unwrap();
        let keys: Vec<_> = mapping.fields.iter().filter_map(Field::key).collect();
        assert_eq!(keys, RESERVED_FIELDS);
    }
}
