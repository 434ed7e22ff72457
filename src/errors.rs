//! Arbor error handling.
//!
//! Every failure surfaced by the library is an [`ArborError`]: one struct
//! carrying a typed kind, the source context it happened in, and the
//! diagnostic extras miette needs to render it. Build failures keep their
//! full context (module name, path, offending source) on the error itself
//! so callers can report precise locations without re-reading anything.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// Source text attached to an error for span rendering.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// The single error type: what went wrong, where, and how to present it.
#[derive(Debug)]
pub struct ArborError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
}

/// All failure kinds, without duplicated context fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// A module could not be built at all (unreadable file, missing source).
    Building { detail: String },
    /// The parser rejected the source text.
    Syntax { detail: String },
    /// A declared source encoding has no known decoder.
    UnknownEncoding { declared: String },
    /// The declared encoding disagrees with the detected one.
    EncodingMismatch { declared: String, detected: String },
    /// No conversion routine exists for a raw parse-tree kind.
    NoConversion { kind: String },
    /// A raw parse tree did not have the shape its kind promises.
    MalformedTree { detail: String },
    /// A relative import asked for more ascents than the module has.
    TooManyLevels { level: u32, name: String },
    /// A parameter default was requested where none exists.
    NoDefault { function: String, argument: String },
    /// A capability was requested on a node that does not provide it.
    NotSupported { capability: String },
}

/// Where the error happened.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Option<Arc<NamedSource<String>>>,
    pub span: SourceSpan,
    pub module: Option<String>,
    pub path: Option<PathBuf>,
}

impl SourceInfo {
    pub fn bare() -> Self {
        Self {
            source: None,
            span: unspanned(),
            module: None,
            path: None,
        }
    }
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Construction of a module failed; no tree exists.
    Building,
    /// Construction failed because the source text does not parse.
    Syntax,
    /// A recoverable query outcome callers are expected to branch on.
    Query,
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Building { .. }
            | Self::UnknownEncoding { .. }
            | Self::EncodingMismatch { .. }
            | Self::NoConversion { .. }
            | Self::MalformedTree { .. } => ErrorCategory::Building,

            Self::Syntax { .. } => ErrorCategory::Syntax,

            Self::TooManyLevels { .. }
            | Self::NoDefault { .. }
            | Self::NotSupported { .. } => ErrorCategory::Query,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::Building { .. } => "building",
            Self::Syntax { .. } => "syntax",
            Self::UnknownEncoding { .. } => "unknown_encoding",
            Self::EncodingMismatch { .. } => "encoding_mismatch",
            Self::NoConversion { .. } => "no_conversion",
            Self::MalformedTree { .. } => "malformed_tree",
            Self::TooManyLevels { .. } => "too_many_levels",
            Self::NoDefault { .. } => "no_default",
            Self::NotSupported { .. } => "not_supported",
        }
    }
}

impl ArborError {
    pub fn new(kind: ErrorKind, source_info: SourceInfo) -> Self {
        let stage = match kind.category() {
            ErrorCategory::Building | ErrorCategory::Syntax => "build",
            ErrorCategory::Query => "query",
        };
        let error_code = format!("arbor::{}::{}", stage, kind.code_suffix());
        Self {
            kind,
            source_info,
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }

    /// Shorthand for errors with no source attachment.
    pub fn bare(kind: ErrorKind) -> Self {
        Self::new(kind, SourceInfo::bare())
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.source_info.module = Some(module.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_info.path = Some(path.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// True for every kind that means "no tree was produced".
    pub fn is_building_failure(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Building | ErrorCategory::Syntax
        )
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::Building { .. } => "build failed here".into(),
            ErrorKind::Syntax { .. } => "invalid syntax".into(),
            ErrorKind::UnknownEncoding { .. } => "undecodable source".into(),
            ErrorKind::EncodingMismatch { .. } => "encoding mismatch".into(),
            ErrorKind::NoConversion { .. } => "unconvertible construct".into(),
            ErrorKind::MalformedTree { .. } => "malformed tree".into(),
            ErrorKind::TooManyLevels { .. } => "relative import too deep".into(),
            ErrorKind::NoDefault { .. } => "no default value".into(),
            ErrorKind::NotSupported { .. } => "unsupported capability".into(),
        }
    }
}

impl std::error::Error for ArborError {}

impl fmt::Display for ArborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.source_info.module.as_deref().unwrap_or("<?>");
        match &self.kind {
            ErrorKind::Building { detail } => {
                write!(f, "Failed to build module {}: {}", module, detail)
            }
            ErrorKind::Syntax { detail } => {
                write!(f, "Parsing of module {} failed: {}", module, detail)
            }
            ErrorKind::UnknownEncoding { declared } => {
                write!(
                    f,
                    "Failed to build module {}: unknown source encoding {:?}",
                    module, declared
                )
            }
            ErrorKind::EncodingMismatch { declared, detected } => {
                write!(
                    f,
                    "Failed to build module {}: declared encoding {:?} but detected {:?}",
                    module, declared, detected
                )
            }
            ErrorKind::NoConversion { kind } => {
                write!(f, "No conversion available for raw node kind {:?}", kind)
            }
            ErrorKind::MalformedTree { detail } => {
                write!(f, "Malformed raw tree: {}", detail)
            }
            ErrorKind::TooManyLevels { level, name } => {
                write!(
                    f,
                    "Relative import with too many levels ({}) for module {:?}",
                    level, name
                )
            }
            ErrorKind::NoDefault { function, argument } => {
                write!(f, "{:?} has no default for {:?}", function, argument)
            }
            ErrorKind::NotSupported { capability } => {
                write!(f, "Capability {:?} is not provided by this node", capability)
            }
        }
    }
}

impl Diagnostic for ArborError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.source_info.source.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .source
            .as_ref()
            .map(|s| &**s as &dyn miette::SourceCode)
    }
}

// ============================================================================
// SPAN UTILITIES
// ============================================================================

/// Placeholder span for errors not tied to a source location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Span covering one line/column position inside `content`.
pub fn position_span(content: &str, line: u32, column: u32) -> SourceSpan {
    let mut offset = 0usize;
    for (idx, l) in content.split('\n').enumerate() {
        if idx + 1 == line as usize {
            offset += (column as usize).min(l.len());
            return SourceSpan::from(offset..(offset + 1).min(content.len()));
        }
        offset += l.len() + 1;
    }
    unspanned()
}

/// Prints an error with full miette diagnostics; for CLI use.
pub fn print_error(error: ArborError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
