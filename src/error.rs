use crate::{cfg::CfgError, lexer::SourceRange};
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::{fmt, ops::Range};

type Span<'a> = (&'a str, Range<usize>);

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Lexer,
    Parser,
    TypeCheck,
    Generator,
    Cfg,
    Io,
    Usage,
}

#[derive(Debug)]
pub struct Error {
    pub error_type: ErrorType,
    pub message: String,
    pub range: Option<SourceRange>,
}

impl Error {
    pub fn new(error_type: ErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            range: None,
        }
    }

    pub fn new_with_range(error_type: ErrorType, message: String, range: SourceRange) -> Self {
        Self {
            error_type,
            message,
            range: Some(range),
        }
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range.get_or_insert(range);
        self
    }

    /// Print this error as a report against `source`, read from `file`.
    pub fn print(&self, file: &str, source: &str) -> std::io::Result<()> {
        let title = format!("{:?} error", self.error_type);

        match self.range {
            Some(range) => Report::<Span>::build(ReportKind::Error, file, range.start)
                .with_message(&title)
                .with_label(
                    Label::new((file, range.into()))
                        .with_message(&self.message)
                        .with_color(Color::Red),
                )
                .finish()
                .eprint((file, Source::from(source))),
            None => Report::<Span>::build(ReportKind::Error, file, 0)
                .with_message(format!("{}: {}", title, self.message))
                .finish()
                .eprint((file, Source::from(source))),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} error: {}", self.error_type, self.message)
    }
}

impl std::error::Error for Error {}

impl From<CfgError> for Error {
    fn from(error: CfgError) -> Self {
        Error::new(ErrorType::Cfg, error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::new(ErrorType::Io, error.to_string())
    }
}
