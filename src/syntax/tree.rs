//! Concrete syntax tree for annotated module documents.
//!
//! The tree is immutable and persistent: nodes are shared through `Arc`, module
//! members live in an `im::Vector`, and every edit builds new nodes along the
//! path to the root while untouched subtrees are shared with the original.
//!
//! Every token keeps its leading and trailing trivia, so rendering a tree with
//! [`ToSource`] reproduces the parsed text exactly.

use std::{fmt, sync::Arc};

use im::Vector;
use serde::Serialize;

// ============================================================================
// SPANS AND IDENTITY
// ============================================================================

/// Byte range in the original document text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Identity of an annotation node.
///
/// Every parse gets its own `tree` number, so ids from different documents,
/// or from two parses of the same text, never compare equal. Within a tree,
/// `index` counts annotations in document order. A replacement node keeps the
/// id of the node it replaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId {
    tree: u64,
    index: u32,
}

impl NodeId {
    pub(crate) fn new(tree: u64, index: u32) -> Self {
        Self { tree, index }
    }

    /// The parse this node came from.
    pub fn tree(&self) -> u64 {
        self.tree
    }

    /// Position among the tree's annotations.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

// ============================================================================
// SOURCE RENDERING
// ============================================================================

/// Renders a node back to source text, trivia included.
pub trait ToSource {
    fn write_source(&self, out: &mut String);

    fn source_text(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }
}

// ============================================================================
// TOKENS
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    At,
    Colon,
    Comma,
    Ellipsis,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Identifier,
    StringLiteral,
    NumericLiteral,
    BooleanLiteral,
    NilLiteral,
    Qualifier,
    FunctionKeyword,
    Signature,
    FunctionBody,
    DeclarationText,
    ValueText,
    EndOfFile,
}

impl TokenKind {
    /// The fixed text of punctuation tokens.
    pub const fn fixed_text(self) -> Option<&'static str> {
        match self {
            Self::At => Some("@"),
            Self::Colon => Some(":"),
            Self::Comma => Some(","),
            Self::Ellipsis => Some("..."),
            Self::OpenBrace => Some("{"),
            Self::CloseBrace => Some("}"),
            Self::OpenBracket => Some("["),
            Self::CloseBracket => Some("]"),
            Self::OpenParen => Some("("),
            Self::CloseParen => Some(")"),
            Self::EndOfFile => Some(""),
            _ => None,
        }
    }
}

/// A token with its surrounding trivia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    kind: TokenKind,
    text: String,
    leading_trivia: String,
    trailing_trivia: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            leading_trivia: String::new(),
            trailing_trivia: String::new(),
        }
    }

    /// Creates a punctuation token without trivia.
    pub fn punctuation(kind: TokenKind) -> Self {
        Self::new(kind, kind.fixed_text().unwrap_or_default())
    }

    pub fn identifier(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Identifier, text)
    }

    pub fn with_leading_trivia(mut self, trivia: impl Into<String>) -> Self {
        self.leading_trivia = trivia.into();
        self
    }

    pub fn with_trailing_trivia(mut self, trivia: impl Into<String>) -> Self {
        self.trailing_trivia = trivia.into();
        self
    }

    /// The same token with all trivia removed.
    pub fn without_trivia(&self) -> Self {
        Self::new(self.kind, self.text.clone())
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn leading_trivia(&self) -> &str {
        &self.leading_trivia
    }

    pub fn trailing_trivia(&self) -> &str {
        &self.trailing_trivia
    }
}

impl ToSource for Token {
    fn write_source(&self, out: &mut String) {
        out.push_str(&self.leading_trivia);
        out.push_str(&self.text);
        out.push_str(&self.trailing_trivia);
    }
}

// ============================================================================
// SEPARATED LISTS
// ============================================================================

/// Items interleaved with separator tokens: `item (sep item)*`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeparatedList<T> {
    items: Vec<T>,
    separators: Vec<Token>,
}

impl<T> SeparatedList<T> {
    /// Builds a list from items and the separators between them.
    ///
    /// Returns `None` unless there is exactly one separator between each pair
    /// of items.
    pub fn new(items: Vec<T>, separators: Vec<Token>) -> Option<Self> {
        (separators.len() == items.len().saturating_sub(1)).then_some(Self { items, separators })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// The separator written before item `index`.
    pub fn separator_before(&self, index: usize) -> Option<&Token> {
        index.checked_sub(1).and_then(|i| self.separators.get(i))
    }
}

impl<T: ToSource> ToSource for SeparatedList<T> {
    fn write_source(&self, out: &mut String) {
        for (index, item) in self.items.iter().enumerate() {
            if let Some(separator) = self.separator_before(index) {
                separator.write_source(out);
            }
            item.write_source(out);
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// A simple (`Tool`) or qualified (`ai:Tool`) name reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NameReference {
    Simple(Token),
    Qualified {
        prefix: Token,
        colon: Token,
        identifier: Token,
    },
}

impl NameReference {
    /// The reference as written, without trivia (`ai:Tool`).
    pub fn name(&self) -> String {
        match self {
            Self::Simple(identifier) => identifier.text().to_string(),
            Self::Qualified {
                prefix, identifier, ..
            } => format!("{}:{}", prefix.text(), identifier.text()),
        }
    }

    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified { .. })
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Self::Simple(identifier) | Self::Qualified { identifier, .. } => identifier,
        }
    }
}

impl ToSource for NameReference {
    fn write_source(&self, out: &mut String) {
        match self {
            Self::Simple(identifier) => identifier.write_source(out),
            Self::Qualified {
                prefix,
                colon,
                identifier,
            } => {
                prefix.write_source(out);
                colon.write_source(out);
                identifier.write_source(out);
            }
        }
    }
}

/// A braced key-value literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mapping {
    pub open_brace: Token,
    pub fields: SeparatedList<Field>,
    pub close_brace: Token,
}

impl Mapping {
    pub fn with_fields(&self, fields: SeparatedList<Field>) -> Self {
        Self {
            open_brace: self.open_brace.clone(),
            fields,
            close_brace: self.close_brace.clone(),
        }
    }

    pub fn with_close_brace(mut self, close_brace: Token) -> Self {
        self.close_brace = close_brace;
        self
    }
}

impl ToSource for Mapping {
    fn write_source(&self, out: &mut String) {
        self.open_brace.write_source(out);
        self.fields.write_source(out);
        self.close_brace.write_source(out);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Field {
    Specific(SpecificField),
    Spread(SpreadField),
    Computed(ComputedField),
}

impl Field {
    /// The field key used for matching, for specific fields only.
    ///
    /// A leading `'` on an identifier key and the quotes of a string key are
    /// not part of the key.
    pub fn key(&self) -> Option<String> {
        let Self::Specific(field) = self else {
            return None;
        };
        let text = field.key.text();
        let key = match field.key.kind() {
            TokenKind::StringLiteral => text
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(text),
            _ => text.strip_prefix('\'').unwrap_or(text),
        };
        Some(key.to_string())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Specific(_) => "key-value field",
            Self::Spread(_) => "spread field",
            Self::Computed(_) => "computed field",
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Self::Specific(field) => match &field.value {
                Some(value) => value.last_token(),
                None => field.colon.as_ref().unwrap_or(&field.key),
            },
            Self::Spread(field) => field.expr.last_token(),
            Self::Computed(field) => field.value.last_token(),
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            Self::Specific(field) => &field.key,
            Self::Spread(field) => &field.ellipsis,
            Self::Computed(field) => &field.open_bracket,
        }
    }
}

impl ToSource for Field {
    fn write_source(&self, out: &mut String) {
        match self {
            Self::Specific(field) => {
                field.key.write_source(out);
                if let Some(colon) = &field.colon {
                    colon.write_source(out);
                }
                if let Some(value) = &field.value {
                    value.write_source(out);
                }
            }
            Self::Spread(field) => {
                field.ellipsis.write_source(out);
                field.expr.write_source(out);
            }
            Self::Computed(field) => {
                field.open_bracket.write_source(out);
                field.key.write_source(out);
                field.close_bracket.write_source(out);
                field.colon.write_source(out);
                field.value.write_source(out);
            }
        }
    }
}

/// `key: value`, `"key": value` or the shorthand `key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecificField {
    pub key: Token,
    pub colon: Option<Token>,
    pub value: Option<Expr>,
}

/// `...expr`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadField {
    pub ellipsis: Token,
    pub expr: Expr,
}

/// `[expr]: value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedField {
    pub open_bracket: Token,
    pub key: Expr,
    pub close_bracket: Token,
    pub colon: Token,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListConstructor {
    pub open_bracket: Token,
    pub items: SeparatedList<Expr>,
    pub close_bracket: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallExpression {
    pub callee: NameReference,
    pub open_paren: Token,
    pub arguments: SeparatedList<Expr>,
    pub close_paren: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Mapping(Arc<Mapping>),
    List(Arc<ListConstructor>),
    Literal(Token),
    Name(NameReference),
    Call(Arc<CallExpression>),
    /// A value kept verbatim, such as `1.5d` or `"a" + "b"`.
    Text(Token),
}

impl Expr {
    pub fn first_token(&self) -> &Token {
        match self {
            Self::Mapping(mapping) => &mapping.open_brace,
            Self::List(list) => &list.open_bracket,
            Self::Literal(token) | Self::Text(token) => token,
            Self::Name(NameReference::Simple(token)) => token,
            Self::Name(NameReference::Qualified { prefix, .. }) => prefix,
            Self::Call(call) => match &call.callee {
                NameReference::Simple(token) => token,
                NameReference::Qualified { prefix, .. } => prefix,
            },
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Self::Mapping(mapping) => &mapping.close_brace,
            Self::List(list) => &list.close_bracket,
            Self::Literal(token) | Self::Text(token) => token,
            Self::Name(name) => name.last_token(),
            Self::Call(call) => &call.close_paren,
        }
    }

    pub fn as_mapping(&self) -> Option<&Arc<Mapping>> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}

impl ToSource for Expr {
    fn write_source(&self, out: &mut String) {
        match self {
            Self::Mapping(mapping) => mapping.write_source(out),
            Self::List(list) => {
                list.open_bracket.write_source(out);
                list.items.write_source(out);
                list.close_bracket.write_source(out);
            }
            Self::Literal(token) | Self::Text(token) => token.write_source(out),
            Self::Name(name) => name.write_source(out),
            Self::Call(call) => {
                call.callee.write_source(out);
                call.open_paren.write_source(out);
                call.arguments.write_source(out);
                call.close_paren.write_source(out);
            }
        }
    }
}

// ============================================================================
// ANNOTATIONS AND DECLARATIONS
// ============================================================================

/// `@reference {payload}` attached to a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub id: NodeId,
    /// Location in the parsed document; inherited by replacements.
    pub span: Option<Span>,
    pub at: Token,
    pub reference: NameReference,
    pub value: Option<Arc<Mapping>>,
}

impl Annotation {
    pub fn with_value(&self, value: Mapping) -> Self {
        Self {
            value: Some(Arc::new(value)),
            ..self.clone()
        }
    }

    pub fn with_reference(mut self, reference: NameReference) -> Self {
        self.reference = reference;
        self
    }
}

impl ToSource for Annotation {
    fn write_source(&self, out: &mut String) {
        self.at.write_source(out);
        self.reference.write_source(out);
        if let Some(value) = &self.value {
            value.write_source(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub annotations: Vec<Arc<Annotation>>,
}

impl ToSource for Metadata {
    fn write_source(&self, out: &mut String) {
        for annotation in &self.annotations {
            annotation.write_source(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub metadata: Option<Metadata>,
    pub qualifiers: Vec<Token>,
    pub function_keyword: Token,
    pub name: Token,
    /// Parameter list and return type, kept verbatim.
    pub signature: Token,
    /// Braced body or `= external;`, kept verbatim.
    pub body: Token,
}

impl FunctionDefinition {
    pub fn with_metadata(&self, metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..self.clone()
        }
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Arc<Annotation>> + '_ {
        self.metadata.iter().flat_map(|m| m.annotations.iter())
    }
}

impl ToSource for FunctionDefinition {
    fn write_source(&self, out: &mut String) {
        if let Some(metadata) = &self.metadata {
            metadata.write_source(out);
        }
        for qualifier in &self.qualifiers {
            qualifier.write_source(out);
        }
        self.function_keyword.write_source(out);
        self.name.write_source(out);
        self.signature.write_source(out);
        self.body.write_source(out);
    }
}

/// Any declaration other than a function definition, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherDeclaration {
    pub metadata: Option<Metadata>,
    pub text: Token,
}

impl ToSource for OtherDeclaration {
    fn write_source(&self, out: &mut String) {
        if let Some(metadata) = &self.metadata {
            metadata.write_source(out);
        }
        self.text.write_source(out);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Member {
    Function(Arc<FunctionDefinition>),
    Other(Arc<OtherDeclaration>),
}

impl ToSource for Member {
    fn write_source(&self, out: &mut String) {
        match self {
            Self::Function(function) => function.write_source(out),
            Self::Other(declaration) => declaration.write_source(out),
        }
    }
}

/// Root of a module document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModulePart {
    members: Vector<Member>,
    end_of_file: Token,
}

impl ModulePart {
    pub fn new(members: Vector<Member>, end_of_file: Token) -> Self {
        Self {
            members,
            end_of_file,
        }
    }

    pub fn members(&self) -> &Vector<Member> {
        &self.members
    }

    pub fn end_of_file(&self) -> &Token {
        &self.end_of_file
    }

    pub fn with_members(&self, members: Vector<Member>) -> Self {
        Self {
            members,
            end_of_file: self.end_of_file.clone(),
        }
    }

    /// Function definitions in document order.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionDefinition>> + '_ {
        self.members.iter().filter_map(|member| match member {
            Member::Function(function) => Some(function),
            Member::Other(_) => None,
        })
    }

    /// Every annotation in the module, on any declaration.
    pub fn annotations(&self) -> impl Iterator<Item = &Arc<Annotation>> + '_ {
        self.members.iter().flat_map(|member| {
            let metadata = match member {
                Member::Function(function) => function.metadata.as_ref(),
                Member::Other(declaration) => declaration.metadata.as_ref(),
            };
            metadata.into_iter().flat_map(|m| m.annotations.iter())
        })
    }

    /// Every annotation attached to a function definition, with its function.
    pub fn function_annotations(
        &self,
    ) -> impl Iterator<Item = (&Arc<FunctionDefinition>, &Arc<Annotation>)> + '_ {
        self.functions()
            .flat_map(|function| function.annotations().map(move |a| (function, a)))
    }
}

impl ToSource for ModulePart {
    fn write_source(&self, out: &mut String) {
        for member in &self.members {
            member.write_source(out);
        }
        self.end_of_file.write_source(out);
    }
}
