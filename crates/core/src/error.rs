use serde::{Deserialize, Serialize};

/// Error categories reported through an [`ErrorHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed declaration grammar, number, string or array token.
    Syntax,
    /// Wrong value type or cardinality for a declared parameter.
    Type,
    /// Request issued in a mode where it is not legal.
    State,
    /// Unknown request name or unresolvable handle.
    Bad,
    /// Allocation / registration failure. Unrecoverable for the context.
    NoMem,
    /// Input stream failure.
    System,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "syntax",
            ErrorCode::Type => "type",
            ErrorCode::State => "state",
            ErrorCode::Bad => "bad",
            ErrorCode::NoMem => "nomem",
            ErrorCode::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Severe,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Severe => "severe",
        }
    }
}

/// All failures the decoding layer can produce.
///
/// `line` is the source line of the offending token, 0 when the error did not
/// originate from a stream (programmatic calls, declarations).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RibError {
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("line {line}: {message}")]
    Type { line: u32, message: String },

    /// Request rejected by the mode stack. The stack is left untouched.
    #[error("line {line}: {request} is not legal in {mode} mode")]
    Nesting {
        line: u32,
        request: String,
        mode: String,
    },

    #[error("line {line}: {message}")]
    Bad { line: u32, message: String },

    #[error("resource exhausted: {0}")]
    Resource(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl RibError {
    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        RibError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn type_error(line: u32, message: impl Into<String>) -> Self {
        RibError::Type {
            line,
            message: message.into(),
        }
    }

    pub fn bad(line: u32, message: impl Into<String>) -> Self {
        RibError::Bad {
            line,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RibError::Syntax { .. } => ErrorCode::Syntax,
            RibError::Type { .. } => ErrorCode::Type,
            RibError::Nesting { .. } => ErrorCode::State,
            RibError::Bad { .. } => ErrorCode::Bad,
            RibError::Resource(_) => ErrorCode::NoMem,
            RibError::Io(_) => ErrorCode::System,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RibError::Resource(_) | RibError::Io(_) => Severity::Severe,
            _ => Severity::Error,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            RibError::Syntax { line, .. }
            | RibError::Type { line, .. }
            | RibError::Nesting { line, .. }
            | RibError::Bad { line, .. } => *line,
            RibError::Resource(_) | RibError::Io(_) => 0,
        }
    }

    /// Replace the line number of a stream-less error with `line`.
    pub fn at_line(mut self, at: u32) -> Self {
        match &mut self {
            RibError::Syntax { line, .. }
            | RibError::Type { line, .. }
            | RibError::Nesting { line, .. }
            | RibError::Bad { line, .. } => {
                if *line == 0 {
                    *line = at;
                }
            }
            RibError::Resource(_) | RibError::Io(_) => {}
        }
        self
    }

    /// True for errors after which the owning context should be discarded.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Severe
    }
}

impl From<std::io::Error> for RibError {
    fn from(e: std::io::Error) -> Self {
        RibError::Io(e.to_string())
    }
}

/// A reported error, as stored by [`CollectHandler`] and emitted by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "code":     self.code.as_str(),
            "severity": self.severity.as_str(),
            "message":  self.message,
        })
    }
}

/// The single reporting channel of a context.
pub trait ErrorHandler {
    fn handle(&mut self, code: ErrorCode, severity: Severity, message: &str);

    /// Whether processing should stop after the errors seen so far.
    fn should_abort(&self) -> bool {
        false
    }

    /// Diagnostics retained by the handler, if it keeps any.
    fn diagnostics(&self) -> &[Diagnostic] {
        &[]
    }
}

/// Writes each error to stderr.
#[derive(Debug, Default)]
pub struct PrintHandler;

impl ErrorHandler for PrintHandler {
    fn handle(&mut self, code: ErrorCode, severity: Severity, message: &str) {
        eprintln!("{} [{}] {}", severity.as_str(), code.as_str(), message);
    }
}

#[derive(Debug, Default)]
pub struct IgnoreHandler;

impl ErrorHandler for IgnoreHandler {
    fn handle(&mut self, _code: ErrorCode, _severity: Severity, _message: &str) {}
}

#[derive(Debug, Default)]
pub struct CollectHandler {
    diagnostics: Vec<Diagnostic>,
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }
}

impl ErrorHandler for CollectHandler {
    fn handle(&mut self, code: ErrorCode, severity: Severity, message: &str) {
        self.diagnostics.push(Diagnostic {
            code,
            severity,
            message: message.to_owned(),
        });
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Collects like [`CollectHandler`] and asks the parser to stop at the first
/// error of `Error` severity or worse.
#[derive(Debug, Default)]
pub struct AbortHandler {
    inner: CollectHandler,
    tripped: bool,
}

impl ErrorHandler for AbortHandler {
    fn handle(&mut self, code: ErrorCode, severity: Severity, message: &str) {
        if severity >= Severity::Error {
            self.tripped = true;
        }
        self.inner.handle(code, severity, message);
    }

    fn should_abort(&self) -> bool {
        self.tripped
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        self.inner.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_severities() {
        let e = RibError::syntax(4, "unterminated string");
        assert_eq!(e.code(), ErrorCode::Syntax);
        assert_eq!(e.severity(), Severity::Error);
        assert_eq!(e.to_string(), "line 4: unterminated string");
        assert!(RibError::Resource("token ids".into()).is_fatal());
    }

    #[test]
    fn at_line_only_fills_missing_lines() {
        assert_eq!(RibError::bad(0, "x").at_line(9).line(), 9);
        assert_eq!(RibError::bad(3, "x").at_line(9).line(), 3);
    }

    #[test]
    fn abort_handler_trips_on_errors_only() {
        let mut h = AbortHandler::default();
        h.handle(ErrorCode::Type, Severity::Warning, "meh");
        assert!(!h.should_abort());
        h.handle(ErrorCode::State, Severity::Error, "bad nesting");
        assert!(h.should_abort());
        assert_eq!(h.diagnostics().len(), 2);
    }

    #[test]
    fn diagnostic_json_shape() {
        let d = Diagnostic {
            code: ErrorCode::State,
            severity: Severity::Error,
            message: "line 2: Sphere is not legal in Begin mode".into(),
        };
        let v = d.to_json_value();
        assert_eq!(v["code"], "state");
        assert_eq!(v["severity"], "error");
    }
}
