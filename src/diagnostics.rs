//! Unified, `miette`-based diagnostics for the rewriter.
//!
//! Every failure of the parse, merge, rebuild and commit stages is a
//! [`RewriteError`]. Errors carry an [`ErrorContext`] with the named source the
//! problem was found in, the span inside that source, and an optional help
//! line. Construction goes through the `rewrite_err!` macro.
//!
//! Errors are never recovered from locally: a failing annotation site fails
//! its whole document, so a half-rewritten file is never produced.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification of [`RewriteError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The document or a re-parsed literal is not accepted by the grammar.
    Syntax,
    /// A configuration value is not a valid source expression.
    MalformedConfigValue,
    /// The annotation payload holds something other than simple fields.
    UnsupportedSiteShape,
    /// The host has no syntax tree for a document id.
    Document,
    /// A rewrite plan could not be read or decoded.
    Config,
    /// Invariant violations inside the rewriter.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::MalformedConfigValue => "malformed_config_value",
            ErrorKind::UnsupportedSiteShape => "unsupported_site_shape",
            ErrorKind::Document => "document",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The source the span points into (if any).
    pub source: Option<SourceArc>,
    /// The primary span for this error (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Syntax error: {message}")]
    Syntax {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
    #[error("Malformed configuration value: {message}")]
    MalformedConfigValue {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
    #[error("Unsupported annotation shape: {message}")]
    UnsupportedSiteShape {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
    #[error("Document error: {message}")]
    Document {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Cause>,
    },
}

impl RewriteError {
    fn parts(&self) -> (&String, &ErrorContext) {
        match self {
            RewriteError::Syntax { message, ctx, .. }
            | RewriteError::MalformedConfigValue { message, ctx, .. }
            | RewriteError::UnsupportedSiteShape { message, ctx, .. }
            | RewriteError::Document { message, ctx, .. }
            | RewriteError::Config { message, ctx, .. }
            | RewriteError::Internal { message, ctx, .. } => (message, ctx),
        }
    }

    fn parts_mut(&mut self) -> (&mut ErrorContext, &mut Option<Cause>) {
        match self {
            RewriteError::Syntax { ctx, source, .. }
            | RewriteError::MalformedConfigValue { ctx, source, .. }
            | RewriteError::UnsupportedSiteShape { ctx, source, .. }
            | RewriteError::Document { ctx, source, .. }
            | RewriteError::Config { ctx, source, .. }
            | RewriteError::Internal { ctx, source, .. } => (ctx, source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RewriteError::Syntax { .. } => ErrorKind::Syntax,
            RewriteError::MalformedConfigValue { .. } => ErrorKind::MalformedConfigValue,
            RewriteError::UnsupportedSiteShape { .. } => ErrorKind::UnsupportedSiteShape,
            RewriteError::Document { .. } => ErrorKind::Document,
            RewriteError::Config { .. } => ErrorKind::Config,
            RewriteError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        self.parts().0
    }

    pub fn context(&self) -> &ErrorContext {
        self.parts().1
    }

    /// Points the error at a location in `source`, unless it already has one.
    pub fn in_source(mut self, source: &SourceArc, span: Option<Span>) -> Self {
        let (ctx, _) = self.parts_mut();
        if ctx.source.is_none() {
            ctx.source = Some(Arc::clone(source));
            ctx.span = span;
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.parts_mut().0.help = Some(help.into());
        self
    }

    pub fn caused_by(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        *self.parts_mut().1 = Some(Box::new(cause));
        self
    }
}

impl Diagnostic for RewriteError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("annotweave::{}", self.kind())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.context()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        let span = ctx.span?;
        let len = span.end.saturating_sub(span.start);
        let label = LabeledSpan::new(Some(message.clone()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Wraps document text into a named source for error contexts.
pub fn to_named_source(name: &str, text: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, text.to_string()))
}

/// Prints a [`RewriteError`] with full miette diagnostics.
pub fn print_error(error: RewriteError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

/// Constructs a [`RewriteError`] variant.
///
/// - `rewrite_err!(Variant, "message")`
/// - `rewrite_err!(Variant, "message", source, span)`
#[macro_export]
macro_rules! rewrite_err {
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::RewriteError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::RewriteError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}
