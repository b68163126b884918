use crate::span::Span;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LowerError {
    /// An upstream invariant did not hold. Lowering of the routine stops.
    #[error("internal compiler error: {msg}")]
    Internal { msg: String, span: Span },

    /// A user-facing error. Lowering continues so further errors are reported,
    /// but the routine's output must not reach code generation.
    #[error("{msg}")]
    Semantic { msg: String, span: Span },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },

    /// The serialized routine handed to the driver could not be read.
    #[error("Input error: {msg}")]
    Input { msg: String, path: PathBuf },
}

impl LowerError {
    pub fn internal(msg: impl Into<String>, span: Span) -> Self {
        Self::Internal { msg: msg.into(), span }
    }

    pub fn semantic(msg: impl Into<String>, span: Span) -> Self {
        Self::Semantic { msg: msg.into(), span }
    }

    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    pub fn input(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Input { msg: msg.into(), path }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, LowerError::Internal { .. })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            LowerError::Internal { span, .. } | LowerError::Semantic { span, .. } => Some(*span),
            LowerError::Config { .. } | LowerError::Input { .. } => None,
        }
    }
}

/// Render a LowerError with ariadne for nice terminal output.
///
/// Errors on synthesized nodes (dummy spans) or without source text fall back
/// to a single `error:` line.
pub fn render_error(source: Option<&str>, filename: &str, err: &LowerError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match (err, source) {
        (LowerError::Internal { msg, span } | LowerError::Semantic { msg, span }, Some(source))
            if !span.is_dummy() && span.end <= source.len() =>
        {
            let kind_str = match err {
                LowerError::Internal { .. } => "internal compiler error",
                _ => "error",
            };
            let rendered = Report::build(ReportKind::Error, (), span.start)
                .with_message(kind_str)
                .with_label(Label::new(span.start..span.end).with_message(msg))
                .finish()
                .eprint(Source::from(source));
            if rendered.is_err() {
                eprintln!("{filename}: {err}");
            }
        }
        (LowerError::Config { msg, path }, _) => {
            eprintln!("error[config]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        (LowerError::Input { msg, path }, _) => {
            eprintln!("error[input]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        _ => {
            eprintln!("{filename}: error: {err}");
        }
    }
}
