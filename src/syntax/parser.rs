//! Annotweave parser: pest grammar to concrete syntax tree.
//!
//! Parsing runs in two passes over the pest pairs. The first collects every
//! token span in document order and attaches trivia from the gaps between
//! them; the second walks the pairs and builds tree nodes, taking tokens (with
//! their trivia) from that sequence in the same order.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use im::Vector;
use pest::{
    error::{ErrorVariant, InputLocation},
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;

use crate::{
    diagnostics::{to_named_source, SourceArc},
    rewrite_err,
    syntax::{
        trivia::attach_trivia, Annotation, CallExpression, ComputedField, Expr, Field,
        FunctionDefinition, ListConstructor, Mapping, Member, Metadata, ModulePart,
        NameReference, NodeId, OtherDeclaration, SeparatedList, Span, SpecificField,
        SpreadField, SyntaxTree, Token, TokenKind,
    },
    RewriteError,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct ModuleGrammar;

/// Source of the per-parse part of every [`NodeId`].
static NEXT_TREE: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a module document into a syntax tree.
pub fn parse_module(name: &str, text: &str) -> Result<SyntaxTree, RewriteError> {
    let source = to_named_source(name, text);
    let pairs = ModuleGrammar::parse(Rule::module, text)
        .map_err(|e| convert_parse_error(e, &source))?;

    let mut builder = TreeBuilder::new(text, &pairs, source.clone());
    let module = single_pair(pairs, &source)?;
    let root = builder.build_module(module)?;
    Ok(SyntaxTree::new(name, source, root))
}

/// Parses a standalone expression, such as a configuration value.
///
/// Text before the expression becomes leading trivia of its first token and
/// text after it trails its last token.
pub fn parse_expression(text: &str) -> Result<Expr, RewriteError> {
    let source = to_named_source("<expression>", text);
    let pairs = ModuleGrammar::parse(Rule::expression_root, text)
        .map_err(|e| convert_parse_error(e, &source))?;

    let mut builder = TreeBuilder::new(text, &pairs, source.clone());
    builder.fold_end_of_file_trivia();
    let root = single_pair(pairs, &source)?;

    let mut expr = None;
    for inner in root.into_inner() {
        match inner.as_rule() {
            Rule::EOI => {
                builder.token(&inner)?;
            }
            _ => expr = Some(builder.build_expr(inner)?),
        }
    }
    expr.ok_or_else(|| rewrite_err!(Syntax, "expected an expression", &source, Span::default()))
}

/// Parses a key-value literal such as `{name: "sum"}`.
pub fn parse_mapping(text: &str) -> Result<Mapping, RewriteError> {
    match parse_expression(text)? {
        Expr::Mapping(mapping) => Ok(Arc::unwrap_or_clone(mapping)),
        other => {
            let source = to_named_source("<expression>", text);
            let span = Span {
                start: 0,
                end: text.len(),
            };
            Err(rewrite_err!(
                Syntax,
                format!("expected a key-value literal, found `{}`", other.first_token().text()),
                &source,
                span
            ))
        }
    }
}

// ============================================================================
// TREE BUILDER
// ============================================================================

struct TreeBuilder {
    source: SourceArc,
    trivia: Vec<(String, String)>,
    cursor: usize,
    tree: u64,
    next_id: u32,
}

impl TreeBuilder {
    fn new(text: &str, pairs: &Pairs<Rule>, source: SourceArc) -> Self {
        let spans: Vec<(usize, usize)> = pairs
            .clone()
            .flatten()
            .filter(|pair| token_kind(pair.as_rule()).is_some())
            .map(|pair| (pair.as_span().start(), pair.as_span().end()))
            .collect();
        Self {
            source,
            trivia: attach_trivia(text, &spans),
            cursor: 0,
            tree: NEXT_TREE.fetch_add(1, Ordering::Relaxed),
            next_id: 0,
        }
    }

    /// Moves the end-of-file leading trivia onto the last real token.
    fn fold_end_of_file_trivia(&mut self) {
        if self.trivia.len() < 2 {
            return;
        }
        let last = self.trivia.len() - 1;
        let rest = std::mem::take(&mut self.trivia[last].0);
        self.trivia[last - 1].1.push_str(&rest);
    }

    fn token(&mut self, pair: &Pair<Rule>) -> Result<Token, RewriteError> {
        let kind = token_kind(pair.as_rule())
            .ok_or_else(|| self.unexpected(pair, "a token"))?;
        let (leading, trailing) = self
            .trivia
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| self.unexpected(pair, "a token with trivia"))?;
        self.cursor += 1;
        Ok(Token::new(kind, pair.as_str())
            .with_leading_trivia(leading)
            .with_trailing_trivia(trailing))
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId::new(self.tree, self.next_id);
        self.next_id += 1;
        id
    }

    fn build_module(&mut self, pair: Pair<Rule>) -> Result<ModulePart, RewriteError> {
        let span = span_of(&pair);
        let mut members = Vector::new();
        let mut end_of_file = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::function_definition => {
                    let function = self.build_function(inner)?;
                    members.push_back(Member::Function(Arc::new(function)));
                }
                Rule::other_declaration => {
                    let declaration = self.build_other_declaration(inner)?;
                    members.push_back(Member::Other(Arc::new(declaration)));
                }
                Rule::EOI => end_of_file = Some(self.token(&inner)?),
                _ => return Err(self.unexpected(&inner, "a declaration")),
            }
        }

        let end_of_file = self.required(end_of_file, "end of input", span)?;
        Ok(ModulePart::new(members, end_of_file))
    }

    fn build_function(&mut self, pair: Pair<Rule>) -> Result<FunctionDefinition, RewriteError> {
        let span = span_of(&pair);
        let mut metadata = None;
        let mut qualifiers = Vec::new();
        let mut function_keyword = None;
        let mut name = None;
        let mut signature = None;
        let mut body = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::metadata => metadata = Some(self.build_metadata(inner)?),
                Rule::qualifier => qualifiers.push(self.token(&inner)?),
                Rule::function_keyword => function_keyword = Some(self.token(&inner)?),
                Rule::identifier => name = Some(self.token(&inner)?),
                Rule::signature => signature = Some(self.token(&inner)?),
                Rule::function_body => body = Some(self.token(&inner)?),
                _ => return Err(self.unexpected(&inner, "part of a function definition")),
            }
        }

        Ok(FunctionDefinition {
            metadata,
            qualifiers,
            function_keyword: self.required(function_keyword, "`function` keyword", span)?,
            name: self.required(name, "function name", span)?,
            signature: self.required(signature, "parameter list", span)?,
            body: self.required(body, "function body", span)?,
        })
    }

    fn build_other_declaration(
        &mut self,
        pair: Pair<Rule>,
    ) -> Result<OtherDeclaration, RewriteError> {
        let span = span_of(&pair);
        let mut metadata = None;
        let mut text = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::metadata => metadata = Some(self.build_metadata(inner)?),
                Rule::declaration_text => text = Some(self.token(&inner)?),
                _ => return Err(self.unexpected(&inner, "a declaration")),
            }
        }

        Ok(OtherDeclaration {
            metadata,
            text: self.required(text, "declaration", span)?,
        })
    }

    fn build_metadata(&mut self, pair: Pair<Rule>) -> Result<Metadata, RewriteError> {
        let annotations = pair
            .into_inner()
            .map(|inner| self.build_annotation(inner).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Metadata { annotations })
    }

    fn build_annotation(&mut self, pair: Pair<Rule>) -> Result<Annotation, RewriteError> {
        let span = span_of(&pair);
        let id = self.fresh_id();
        let mut at = None;
        let mut reference = None;
        let mut value = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::at => at = Some(self.token(&inner)?),
                Rule::name_reference => reference = Some(self.build_name_reference(inner)?),
                Rule::mapping => value = Some(Arc::new(self.build_mapping(inner)?)),
                _ => return Err(self.unexpected(&inner, "part of an annotation")),
            }
        }

        Ok(Annotation {
            id,
            span: Some(span),
            at: self.required(at, "`@`", span)?,
            reference: self.required(reference, "annotation reference", span)?,
            value,
        })
    }

    fn build_name_reference(&mut self, pair: Pair<Rule>) -> Result<NameReference, RewriteError> {
        let span = span_of(&pair);
        let tokens = pair
            .into_inner()
            .map(|inner| self.token(&inner))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tokens = tokens.into_iter();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(identifier), None, None) => Ok(NameReference::Simple(identifier)),
            (Some(prefix), Some(colon), Some(identifier)) => Ok(NameReference::Qualified {
                prefix,
                colon,
                identifier,
            }),
            _ => Err(rewrite_err!(Syntax, "malformed name reference", &self.source, span)),
        }
    }

    fn build_mapping(&mut self, pair: Pair<Rule>) -> Result<Mapping, RewriteError> {
        let span = span_of(&pair);
        let mut open_brace = None;
        let mut close_brace = None;
        let mut fields = Vec::new();
        let mut separators = Vec::new();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::open_brace => open_brace = Some(self.token(&inner)?),
                Rule::close_brace => close_brace = Some(self.token(&inner)?),
                Rule::comma => separators.push(self.token(&inner)?),
                Rule::specific_field | Rule::spread_field | Rule::computed_field => {
                    fields.push(self.build_field(inner)?)
                }
                _ => return Err(self.unexpected(&inner, "a mapping field")),
            }
        }

        Ok(Mapping {
            open_brace: self.required(open_brace, "`{`", span)?,
            fields: self.separated(fields, separators, span)?,
            close_brace: self.required(close_brace, "`}`", span)?,
        })
    }

    fn build_field(&mut self, pair: Pair<Rule>) -> Result<Field, RewriteError> {
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();

        match rule {
            Rule::specific_field => {
                let key_pair = self.required(inner.next(), "field name", span)?;
                let key = self.token(&key_pair)?;
                let colon = inner.next().map(|p| self.token(&p)).transpose()?;
                let value = inner.next().map(|p| self.build_expr(p)).transpose()?;
                Ok(Field::Specific(SpecificField { key, colon, value }))
            }
            Rule::spread_field => {
                let ellipsis_pair = self.required(inner.next(), "`...`", span)?;
                let ellipsis = self.token(&ellipsis_pair)?;
                let expr_pair = self.required(inner.next(), "spread expression", span)?;
                let expr = self.build_expr(expr_pair)?;
                Ok(Field::Spread(SpreadField { ellipsis, expr }))
            }
            Rule::computed_field => {
                let open_pair = self.required(inner.next(), "`[`", span)?;
                let open_bracket = self.token(&open_pair)?;
                let key_pair = self.required(inner.next(), "computed key", span)?;
                let key = self.build_expr(key_pair)?;
                let close_pair = self.required(inner.next(), "`]`", span)?;
                let close_bracket = self.token(&close_pair)?;
                let colon_pair = self.required(inner.next(), "`:`", span)?;
                let colon = self.token(&colon_pair)?;
                let value_pair = self.required(inner.next(), "field value", span)?;
                let value = self.build_expr(value_pair)?;
                Ok(Field::Computed(ComputedField {
                    open_bracket,
                    key,
                    close_bracket,
                    colon,
                    value,
                }))
            }
            _ => Err(rewrite_err!(Syntax, "expected a mapping field", &self.source, span)),
        }
    }

    fn build_expr(&mut self, pair: Pair<Rule>) -> Result<Expr, RewriteError> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::mapping => Ok(Expr::Mapping(Arc::new(self.build_mapping(pair)?))),
            Rule::list => {
                let (open_bracket, items, close_bracket) = self.build_delimited(pair)?;
                Ok(Expr::List(Arc::new(ListConstructor {
                    open_bracket,
                    items,
                    close_bracket,
                })))
            }
            Rule::string_literal | Rule::number | Rule::boolean | Rule::nil_literal => {
                Ok(Expr::Literal(self.token(&pair)?))
            }
            Rule::value_text => Ok(Expr::Text(self.token(&pair)?)),
            Rule::name_expression => {
                let mut inner = pair.into_inner();
                let name_pair = self.required(inner.next(), "name", span)?;
                let callee = self.build_name_reference(name_pair)?;
                match inner.next() {
                    None => Ok(Expr::Name(callee)),
                    Some(arguments) => {
                        let (open_paren, arguments, close_paren) =
                            self.build_delimited(arguments)?;
                        Ok(Expr::Call(Arc::new(CallExpression {
                            callee,
                            open_paren,
                            arguments,
                            close_paren,
                        })))
                    }
                }
            }
            _ => Err(self.unexpected(&pair, "an expression")),
        }
    }

    /// Builds `open (expr (, expr)*)? close` for lists and argument lists.
    fn build_delimited(
        &mut self,
        pair: Pair<Rule>,
    ) -> Result<(Token, SeparatedList<Expr>, Token), RewriteError> {
        let span = span_of(&pair);
        let mut open = None;
        let mut close = None;
        let mut items = Vec::new();
        let mut separators = Vec::new();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::open_bracket | Rule::open_paren => open = Some(self.token(&inner)?),
                Rule::close_bracket | Rule::close_paren => close = Some(self.token(&inner)?),
                Rule::comma => separators.push(self.token(&inner)?),
                _ => items.push(self.build_expr(inner)?),
            }
        }

        Ok((
            self.required(open, "opening delimiter", span)?,
            self.separated(items, separators, span)?,
            self.required(close, "closing delimiter", span)?,
        ))
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn separated<T>(
        &self,
        items: Vec<T>,
        separators: Vec<Token>,
        span: Span,
    ) -> Result<SeparatedList<T>, RewriteError> {
        SeparatedList::new(items, separators).ok_or_else(|| {
            rewrite_err!(Internal, "separator count does not match items", &self.source, span)
        })
    }

    fn required<T>(&self, value: Option<T>, element: &str, span: Span) -> Result<T, RewriteError> {
        value.ok_or_else(|| {
            rewrite_err!(Syntax, format!("missing {element}"), &self.source, span)
        })
    }

    fn unexpected(&self, pair: &Pair<Rule>, expected: &str) -> RewriteError {
        rewrite_err!(
            Internal,
            format!("expected {expected}, found rule {:?}", pair.as_rule()),
            &self.source,
            span_of(pair)
        )
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn token_kind(rule: Rule) -> Option<TokenKind> {
    let kind = match rule {
        Rule::at => TokenKind::At,
        Rule::colon => TokenKind::Colon,
        Rule::comma => TokenKind::Comma,
        Rule::ellipsis => TokenKind::Ellipsis,
        Rule::open_brace => TokenKind::OpenBrace,
        Rule::close_brace => TokenKind::CloseBrace,
        Rule::open_bracket => TokenKind::OpenBracket,
        Rule::close_bracket => TokenKind::CloseBracket,
        Rule::open_paren => TokenKind::OpenParen,
        Rule::close_paren => TokenKind::CloseParen,
        Rule::identifier => TokenKind::Identifier,
        Rule::string_literal => TokenKind::StringLiteral,
        Rule::number => TokenKind::NumericLiteral,
        Rule::boolean => TokenKind::BooleanLiteral,
        Rule::nil_literal => TokenKind::NilLiteral,
        Rule::qualifier => TokenKind::Qualifier,
        Rule::function_keyword => TokenKind::FunctionKeyword,
        Rule::signature => TokenKind::Signature,
        Rule::function_body => TokenKind::FunctionBody,
        Rule::declaration_text => TokenKind::DeclarationText,
        Rule::value_text => TokenKind::ValueText,
        Rule::EOI => TokenKind::EndOfFile,
        _ => return None,
    };
    Some(kind)
}

fn span_of(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn single_pair<'i>(
    mut pairs: Pairs<'i, Rule>,
    source: &SourceArc,
) -> Result<Pair<'i, Rule>, RewriteError> {
    pairs
        .next()
        .ok_or_else(|| rewrite_err!(Internal, "parser produced no root", source, Span::default()))
}

fn describe_rule(rule: &Rule) -> &'static str {
    match rule {
        Rule::EOI => "end of input",
        Rule::mapping | Rule::open_brace => "`{`",
        Rule::close_brace => "`}`",
        Rule::comma => "`,`",
        Rule::colon => "`:`",
        Rule::at | Rule::annotation | Rule::metadata => "an annotation",
        Rule::identifier | Rule::name_reference | Rule::name_expression => "a name",
        Rule::specific_field | Rule::spread_field | Rule::computed_field => "a field",
        Rule::string_literal => "a string",
        Rule::value_text => "a value",
        Rule::function_body => "a function body",
        Rule::signature => "a parameter list",
        Rule::declaration_text | Rule::other_declaration | Rule::function_definition => {
            "a declaration"
        }
        Rule::close_bracket => "`]`",
        Rule::close_paren => "`)`",
        _ => "an expression",
    }
}

fn convert_parse_error(error: pest::error::Error<Rule>, source: &SourceArc) -> RewriteError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        InputLocation::Span((start, end)) => Span { start, end },
    };

    let message = match &error.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let mut expected: Vec<&str> = positives.iter().map(describe_rule).collect();
            expected.dedup();
            format!("expected {}", expected.join(" or "))
        }
        ErrorVariant::CustomError { message } => message.clone(),
        _ => "unexpected input".to_string(),
    };

    rewrite_err!(Syntax, message, source, span).caused_by(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ToSource;

    #[test]
    fn test_empty_input() {
        let tree = parse_module("empty.bal", "").unwrap();
        assert!(tree.root().members().is_empty());
        assert_eq!(tree.text(), "");
    }

    #[test]
    fn test_whitespace_only_input_round_trips() {
        let text = "\n  // nothing here\n\n";
        let tree = parse_module("blank.bal", text).unwrap();
        assert_eq!(tree.root().end_of_file().leading_trivia(), text);
        assert_eq!(tree.text(), text);
    }

    #[test]
    fn test_annotation_ids_follow_document_order() {
        let text = "@a:B\n@c\nfunction f() {}\n\n@d:E {}\nfunction g() {}\n";
        let tree = parse_module("ids.bal", text).unwrap();
        let ids: Vec<u32> = tree
            .root()
            .function_annotations()
            .map(|(_, annotation)| annotation.id.index())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_each_parse_has_its_own_ids() {
        let text = "@ai:Tool\nfunction f() {}\n";
        let first = parse_module("a.bal", text).unwrap();
        let second = parse_module("a.bal", text).unwrap();
        let (_, a) = first.root().function_annotations().next().unwrap();
        let (_, b) = second.root().function_annotations().next().unwrap();
        assert_eq!(a.id.index(), b.id.index());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_expression_keeps_outer_trivia() {
        let expr = parse_expression("  {a: 1} \n\n").unwrap();
        assert_eq!(expr.first_token().leading_trivia(), "  ");
        assert_eq!(expr.last_token().trailing_trivia(), " \n\n");
        assert_eq!(expr.source_text(), "  {a: 1} \n\n");
    }

    #[test]
    fn test_unbalanced_literal_fails() {
        let err = parse_expression("{name: \"x\"").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
    }

    #[test]
    fn test_mapping_rejects_other_expressions() {
        assert!(parse_mapping("[1, 2]").is_err());
        assert!(parse_mapping("{}").unwrap().fields.is_empty());
    }
}
