use std::{fs, io, path::Path, sync::Arc};

use crate::{
    ast::{CompilationUnit, Member},
    diagnostic::Diagnostic,
    parser,
    text::SourceText,
};

/// A parsed source text: the unit of compilation input.
#[derive(Debug)]
pub struct SyntaxTree {
    source: Arc<SourceText>,
    root: CompilationUnit,
    diagnostics: Vec<Diagnostic>,
    ends_with_missing: bool,
}

impl SyntaxTree {
    pub fn parse(source: SourceText) -> SyntaxTree {
        let source = Arc::new(source);
        let _span = tracing::debug_span!("parse", path = ?source.path()).entered();
        let parsed = parser::parse_unit(&source);
        tracing::debug!(
            members = parsed.node.members.len(),
            diagnostics = parsed.diagnostics.len(),
            "parsed"
        );
        SyntaxTree {
            source,
            root: parsed.node,
            diagnostics: parsed.diagnostics.into_vec(),
            ends_with_missing: parsed.ends_with_missing,
        }
    }

    pub fn parse_text(text: impl Into<String>) -> SyntaxTree {
        SyntaxTree::parse(SourceText::new(text))
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> io::Result<SyntaxTree> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(SyntaxTree::parse(SourceText::with_path(text, path)))
    }

    pub fn source(&self) -> &Arc<SourceText> {
        &self.source
    }

    pub fn root(&self) -> &CompilationUnit {
        &self.root
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the text forms a complete submission, that is, the parser did
    /// not have to synthesize the final token of the last member.
    pub fn is_complete(&self) -> bool {
        !self.ends_with_missing
    }

    pub fn has_global_statements(&self) -> bool {
        self.root
            .members
            .iter()
            .any(|m| matches!(m, Member::GlobalStatement(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_completeness() {
        assert!(SyntaxTree::parse_text("let a = 1").is_complete());
        assert!(SyntaxTree::parse_text("print(\"x\")").is_complete());
        assert!(!SyntaxTree::parse_text("function f() {").is_complete());
        assert!(!SyntaxTree::parse_text("let a = ").is_complete());
    }

    #[test]
    fn test_diagnostics_carry_source() {
        let tree = SyntaxTree::parse_text("let = 1");
        let [d] = tree.diagnostics() else {
            panic!("expected one diagnostic, got {:?}", tree.diagnostics());
        };
        assert_eq!(d.location().map(|l| l.to_string()), Some("1:5".to_owned()));
        assert!(tree.has_global_statements());
    }
}
