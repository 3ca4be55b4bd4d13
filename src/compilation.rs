use std::{
    collections::HashMap,
    io::{self, BufRead, Write},
    sync::{Arc, OnceLock},
};

use crate::{
    binder::{self, BoundProgram, GlobalScope},
    control_flow::ControlFlowGraph,
    diagnostic::Diagnostic,
    evaluator::{Evaluator, RuntimeError},
    symbols::{Function, Symbol, Variable},
    syntax_tree::SyntaxTree,
    util::fmt::bound,
    value::Value,
};

/// The outcome of a compilation that ran, or was refused because of
/// diagnostics.
#[derive(Debug, PartialEq)]
pub struct EvaluationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub value: Option<Value>,
}

/// A set of syntax trees compiled together, optionally on top of a previous
/// compilation.
///
/// Binding is lazy and happens at most once: concurrent callers of
/// [`Compilation::global_scope`] all observe the same result.
#[derive(Debug)]
pub struct Compilation {
    is_script: bool,
    previous: Option<Arc<Compilation>>,
    trees: Vec<SyntaxTree>,
    global_scope: OnceLock<Arc<GlobalScope>>,
    program: OnceLock<Arc<BoundProgram>>,
}

impl Compilation {
    /// Compiles a program whose entry point is `main`, either declared or
    /// implied by global statements.
    pub fn new(trees: Vec<SyntaxTree>) -> Compilation {
        Compilation::create(false, None, trees)
    }

    /// Compiles a script: global statements are evaluated for their value.
    pub fn new_script(previous: Option<Arc<Compilation>>, trees: Vec<SyntaxTree>) -> Compilation {
        Compilation::create(true, previous, trees)
    }

    fn create(
        is_script: bool,
        previous: Option<Arc<Compilation>>,
        trees: Vec<SyntaxTree>,
    ) -> Compilation {
        Compilation {
            is_script,
            previous,
            trees,
            global_scope: OnceLock::new(),
            program: OnceLock::new(),
        }
    }

    /// Chains a new script submission after this one.
    pub fn continue_with(self: &Arc<Self>, tree: SyntaxTree) -> Compilation {
        Compilation::new_script(Some(Arc::clone(self)), vec![tree])
    }

    pub fn is_script(&self) -> bool {
        self.is_script
    }

    pub fn previous(&self) -> Option<&Arc<Compilation>> {
        self.previous.as_ref()
    }

    pub fn syntax_trees(&self) -> &[SyntaxTree] {
        &self.trees
    }

    pub fn global_scope(&self) -> &Arc<GlobalScope> {
        self.global_scope.get_or_init(|| {
            let previous = self.previous.as_ref().map(|p| Arc::clone(p.global_scope()));
            Arc::new(binder::bind_global_scope(self.is_script, previous, &self.trees))
        })
    }

    pub fn program(&self) -> &Arc<BoundProgram> {
        self.program.get_or_init(|| {
            let previous = self.previous.as_ref().map(|p| Arc::clone(p.program()));
            Arc::new(binder::bind_program(
                self.is_script,
                previous,
                self.global_scope(),
            ))
        })
    }

    /// Syntax and declaration diagnostics, then those found while binding
    /// function bodies. Empty if the compilation can be evaluated.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<_> = self
            .trees
            .iter()
            .flat_map(|tree| tree.diagnostics().iter().cloned())
            .chain(self.global_scope().diagnostics.iter().cloned())
            .collect();
        if diagnostics.is_empty() {
            diagnostics.extend(self.program().diagnostics.iter().cloned());
        }
        diagnostics
    }

    /// Functions and variables visible after this compilation, nearest
    /// declaration first.
    pub fn symbols(&self) -> Vec<Symbol> {
        binder::visible_symbols(self.global_scope())
    }

    /// Evaluates against the process standard streams.
    pub fn evaluate(
        &self,
        globals: &mut HashMap<Variable, Value>,
    ) -> Result<EvaluationResult, RuntimeError> {
        self.evaluate_with(globals, io::stdin().lock(), io::stdout().lock())
    }

    /// Evaluates the compilation unless it has diagnostics. Global variable
    /// values are read from and written back to `globals`.
    pub fn evaluate_with(
        &self,
        globals: &mut HashMap<Variable, Value>,
        input: impl BufRead,
        output: impl Write,
    ) -> Result<EvaluationResult, RuntimeError> {
        let diagnostics = self.diagnostics();
        if !diagnostics.is_empty() {
            tracing::debug!(count = diagnostics.len(), "not evaluating, found diagnostics");
            return Ok(EvaluationResult {
                diagnostics,
                value: None,
            });
        }

        let value = Evaluator::new(self.program(), globals, input, output).evaluate()?;
        Ok(EvaluationResult {
            diagnostics,
            value,
        })
    }

    /// Prints the lowered entry function, if there is one.
    pub fn emit_tree(&self, w: &mut impl Write) -> io::Result<()> {
        let program = self.program();
        match program.entry_point() {
            Some(entry) => self.emit_function_tree(entry, w),
            None => Ok(()),
        }
    }

    /// Prints the lowered body of `function`, searching previous
    /// submissions as well.
    pub fn emit_function_tree(&self, function: &Function, w: &mut impl Write) -> io::Result<()> {
        match self.program().body(function) {
            Some(body) => bound::print_function(w, function, body),
            None => writeln!(w, "{function}"),
        }
    }

    /// Writes the control flow graph of the entry function in Graphviz dot
    /// format.
    pub fn emit_control_flow_graph(&self, w: &mut impl Write) -> io::Result<()> {
        let program = self.program();
        let body = program
            .entry_point()
            .and_then(|entry| program.body(entry))
            .unwrap_or_default();
        ControlFlowGraph::create(body).write_dot(w)
    }

    /// Looks up a function visible from this compilation by name.
    pub fn function(&self, name: &str) -> Option<Function> {
        self.symbols().into_iter().find_map(|symbol| match symbol {
            Symbol::Function(f) if f.name == name => Some(f),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn script(text: &str) -> Compilation {
        Compilation::new_script(None, vec![SyntaxTree::parse_text(text)])
    }

    #[test]
    fn test_global_scope_is_bound_once() {
        let compilation = Arc::new(script("let a = 1"));
        let scopes: Vec<_> = (0..4)
            .map(|_| {
                let compilation = Arc::clone(&compilation);
                thread::spawn(move || Arc::as_ptr(compilation.global_scope()) as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        let first = Arc::as_ptr(compilation.global_scope()) as usize;
        assert!(scopes.iter().all(|&ptr| ptr == first));
    }

    #[test]
    fn test_symbols_are_nearest_first() {
        let first = Arc::new(script("let a = 1 function f() { }"));
        let second = first.continue_with(SyntaxTree::parse_text("let b = a"));
        let names: Vec<_> = second
            .symbols()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["let b: int", "function f()", "let a: int"]);
        assert!(second.function("f").is_some());
        assert!(second.function("print").is_none());
    }

    #[test]
    fn test_emit_tree() {
        let compilation = script("let x = 10 while (x > 0) x -= 3");
        let mut out = Vec::new();
        compilation.emit_tree(&mut out).unwrap();
        let expected = indoc::indoc! {"
            function $eval(): any
            {
              let x = 10
              goto continue1
            label1:
              x = x - 3
            continue1:
              goto label1 if x > 0
            break1:
            }
        "};
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_emit_control_flow_graph() {
        let compilation = script("let x = 1 if (x == 1) x = 2");
        let mut out = Vec::new();
        compilation.emit_control_flow_graph(&mut out).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert!(dot.contains("[label = \"x == 1\"]"));
        assert!(dot.contains("[label = \"!(x == 1)\"]"));
    }

    #[test]
    fn test_diagnostics_block_evaluation() {
        let compilation = script("let a = 1; let a = 2;");
        let mut globals = HashMap::new();
        let result = compilation
            .evaluate_with(&mut globals, io::empty(), io::sink())
            .unwrap();
        assert_eq!(result.value, None);
        let messages: Vec<_> = result.diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(messages, ["variable 'a' is already declared"]);
        assert!(globals.is_empty());
    }
}
