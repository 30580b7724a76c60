use crate::symbolic::SymbolicError;
use crate::syntax::span::Span;

/// A user-facing error or warning tied to a source location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    /// Wrap a symbolic-core error raised while handling the code at `span`.
    pub fn from_symbolic(err: &SymbolicError, span: Span) -> Self {
        let diag = Diagnostic::error(err.to_string(), span);
        match err {
            SymbolicError::TypeMismatch { .. } => diag.with_help(
                "`*` needs a scalar operand unless it is a matrix product, \
                 `/` needs a scalar divisor, other operators need matching shapes"
                    .to_string(),
            ),
            SymbolicError::LayoutConflict { .. } => diag.with_note(
                "every reference to one buffer must use the same element type and view"
                    .to_string(),
            ),
            SymbolicError::InvalidAlignment(_) => {
                diag.with_help("alignment must be one of 1, 2, 4, 8 or 16".to_string())
            }
            SymbolicError::InvalidLocalSize(_) => diag.with_help(
                "set `generator.local_size` to a power of two no larger than 1024".to_string(),
            ),
            SymbolicError::Unbound | SymbolicError::UnsetAccessName { .. } => diag
                .with_note("this is an internal error in kernel generation".to_string()),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if let Err(err) = report.finish().eprint((filename, Source::from(source))) {
            eprintln!("{}: {} (could not render: {})", filename, self.message, err);
        }
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Handle;

    #[test]
    fn test_error_construction() {
        let d = Diagnostic::error("type mismatch".to_string(), Span::new(0, 10, 15));
        assert_eq!(d.severity, Severity::Error);
        assert!(d.is_error());
        assert_eq!(d.span.range(), 10..15);
        assert!(d.notes.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn test_chained_builders() {
        let d = Diagnostic::warning("alignment ignored".to_string(), Span::new(0, 0, 5))
            .with_note("note 1".to_string())
            .with_help("help text".to_string())
            .with_note("note 2".to_string());
        assert!(!d.is_error());
        assert_eq!(d.notes, vec!["note 1", "note 2"]);
        assert_eq!(d.help.as_deref(), Some("help text"));
    }

    #[test]
    fn test_from_symbolic() {
        let err = SymbolicError::LayoutConflict {
            handle: Handle::Buffer(1),
            existing: "vec s1o0 float".to_string(),
            requested: "vec s2o0 float".to_string(),
        };
        let d = Diagnostic::from_symbolic(&err, Span::new(0, 3, 4));
        assert_eq!(
            d.message,
            "buffer 0x1 is bound as vec s1o0 float but used as vec s2o0 float"
        );
        assert_eq!(d.notes.len(), 1);

        let d = Diagnostic::from_symbolic(&SymbolicError::InvalidAlignment(3), Span::default());
        assert!(d.help.is_some());
    }

    #[test]
    fn test_render_does_not_panic() {
        let source = "vector<float> x;\nscalar<float> s;\ns = x;\n";
        let diagnostics = vec![
            Diagnostic::error("type mismatch".to_string(), Span::new(0, 34, 39))
                .with_note("expected scalar, found vector".to_string()),
            Diagnostic::warning("unused x".to_string(), Span::new(0, 14, 15)),
        ];
        render_diagnostics(&diagnostics, "test.sym", source);
    }
}
