//! Error reporting and diagnostics for Tern.
//!
//! This crate provides structured diagnostics with source location tracking.
//! Diagnostics are created by the analysis passes (`tern-bind`, `tern-check`,
//! `tern-emit`) and rendered here for display.
//!
//! The passes report through a [`Reporter`] sink; a pass succeeds iff the
//! reporter's error count is zero. Warnings never fail a pass.

use std::fmt;

use tern_ast::Loc;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Undefined variable, function, or type name.
    UnresolvedIdentifier,
    /// Identifier declared more than once in the same frame.
    Redeclaration,
    /// A value binding hides an outer declaration.
    Shadowing,
    /// A non-anonymous binding was never referenced.
    UnusedIdentifier,
    /// Expected type does not match the found type.
    TypeMismatch,
    /// No type can be synthesized without an annotation.
    CannotInfer,
    /// Inferring a declaration's type requires the declaration itself.
    RecursiveInference,
    /// Statements after a diverging statement.
    UnreachableCode,
    /// `break`/`continue`/`return` outside its construct.
    OutsideConstruct,
    /// Missing or duplicate record field.
    RecordField,
    /// Projection or path names a member that does not exist.
    UnknownMember,
    /// Assignment target is not mutable.
    NonMutableAssignment,
    /// Type arguments missing, or supplied where none are accepted.
    BadTypeArguments,
    /// Array index is not an integer.
    IndexExpected,
    /// Callee is neither a function nor an array.
    CalleeExpected,
    /// Member access on a type that has no members.
    StructureExpected,
    /// A construct the CPS emitter does not lower yet.
    Unsupported,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::UnresolvedIdentifier => "unresolved_identifier",
            Category::Redeclaration => "redeclaration",
            Category::Shadowing => "shadowing",
            Category::UnusedIdentifier => "unused_identifier",
            Category::TypeMismatch => "type_mismatch",
            Category::CannotInfer => "cannot_infer",
            Category::RecursiveInference => "recursive_inference",
            Category::UnreachableCode => "unreachable_code",
            Category::OutsideConstruct => "outside_construct",
            Category::RecordField => "record_field",
            Category::UnknownMember => "unknown_member",
            Category::NonMutableAssignment => "non_mutable_assignment",
            Category::BadTypeArguments => "bad_type_arguments",
            Category::IndexExpected => "index_expected",
            Category::CalleeExpected => "callee_expected",
            Category::StructureExpected => "structure_expected",
            Category::Unsupported => "unsupported",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::UnresolvedIdentifier => "E0001",
            Category::Redeclaration => "E0002",
            Category::Shadowing => "W0001",
            Category::UnusedIdentifier => "W0002",
            Category::TypeMismatch => "E0003",
            Category::CannotInfer => "E0004",
            Category::RecursiveInference => "E0005",
            Category::UnreachableCode => "E0006",
            Category::OutsideConstruct => "E0007",
            Category::RecordField => "E0008",
            Category::UnknownMember => "E0009",
            Category::NonMutableAssignment => "E0010",
            Category::BadTypeArguments => "E0011",
            Category::IndexExpected => "E0012",
            Category::CalleeExpected => "E0013",
            Category::StructureExpected => "E0014",
            Category::Unsupported => "E0015",
        }
    }
}

// ---------------------------------------------------------------------------
// Styled tokens
// ---------------------------------------------------------------------------

/// Inline message styling. The analysis passes treat these as opaque; the
/// default renderer quotes rather than colors, so formatted messages stay
/// stable under test.
pub mod style {
    /// A language keyword inside a message: `break`, `mut`, ...
    pub fn keyword(text: &str) -> String {
        format!("'{text}'")
    }

    /// An emphasized word inside a message.
    pub fn emphasis(text: &str) -> String {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A secondary message attached to a diagnostic, optionally located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub loc: Option<Loc>,
    pub message: String,
}

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub loc: Option<Loc>,
    /// Follow-up notes, in emission order.
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
            loc: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message: message.into(),
            loc: None,
            notes: Vec::new(),
        }
    }

    pub fn at(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.loc {
            Some(loc) => write!(f, "{prefix}[{}]: {} ({loc})", self.category.code(), self.message)?,
            None => write!(f, "{prefix}[{}]: {}", self.category.code(), self.message)?,
        }
        for note in &self.notes {
            match note.loc {
                Some(loc) => write!(f, "\n  note: {} ({loc})", note.message)?,
                None => write!(f, "\n  note: {}", note.message)?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Accumulating diagnostic sink shared by all passes.
///
/// Diagnostics are kept in emission order, which is fully determined by AST
/// traversal order, so repeated runs over the same tree report identically.
/// `note` attaches to the most recent diagnostic, mirroring how the passes
/// interleave `error(...)` and `note(...)` calls.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, category: Category, loc: Loc, message: impl Into<String>) {
        self.errors += 1;
        self.diagnostics
            .push(Diagnostic::error(category, message).at(loc));
    }

    pub fn warn(&mut self, category: Category, loc: Loc, message: impl Into<String>) {
        self.warnings += 1;
        self.diagnostics
            .push(Diagnostic::warning(category, message).at(loc));
    }

    /// Attach an unlocated note to the last diagnostic.
    pub fn note(&mut self, message: impl Into<String>) {
        self.note_inner(None, message.into());
    }

    /// Attach a located note to the last diagnostic.
    pub fn note_at(&mut self, loc: Loc, message: impl Into<String>) {
        self.note_inner(Some(loc), message.into());
    }

    fn note_inner(&mut self, loc: Option<Loc>, message: String) {
        let last = self
            .diagnostics
            .last_mut()
            .expect("note without a preceding diagnostic");
        last.notes.push(Note { loc, message });
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics, for crate-boundary APIs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::{FileId, Pos};

    fn loc() -> Loc {
        Loc::new(FileId(0), Pos { row: 2, col: 5 }, Pos { row: 2, col: 8 })
    }

    #[test]
    fn reporter_counts_by_severity() {
        let mut reporter = Reporter::new();
        reporter.error(Category::TypeMismatch, loc(), "expected type 'i32'");
        reporter.warn(Category::UnusedIdentifier, loc(), "unused identifier 'x'");
        reporter.note("prefix unused identifiers with '_'");
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);
        assert_eq!(reporter.diagnostics().len(), 2);
        assert_eq!(reporter.diagnostics()[1].notes.len(), 1);
    }

    #[test]
    fn diagnostic_display_includes_code_and_notes() {
        let mut reporter = Reporter::new();
        reporter.error(Category::UnresolvedIdentifier, loc(), "unknown identifier 'fo'");
        reporter.note("did you mean 'foo'?");
        let rendered = reporter.diagnostics()[0].to_string();
        assert!(rendered.starts_with("error[E0001]: unknown identifier 'fo'"));
        assert!(rendered.contains("did you mean 'foo'?"));
    }

    #[test]
    fn notes_attach_to_most_recent_diagnostic() {
        let mut reporter = Reporter::new();
        reporter.error(Category::Redeclaration, loc(), "identifier 'x' already declared");
        reporter.note_at(loc(), "previously declared here");
        reporter.error(Category::TypeMismatch, loc(), "expected type 'bool'");
        assert_eq!(reporter.diagnostics()[0].notes.len(), 1);
        assert!(reporter.diagnostics()[1].notes.is_empty());
    }
}
