use std::{
    collections::HashMap,
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::Parser as _;
use prolang::{
    compilation::{Compilation, EvaluationResult},
    diagnostic::Diagnostic,
    symbols::Variable,
    syntax_tree::SyntaxTree,
    util::fmt::tree,
    value::Value,
};
use tracing_subscriber::EnvFilter;

/// Runs ProLang programs, or starts an interactive session when no paths are
/// given.
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source files, or directories searched recursively for `.prl` files.
    paths: Vec<PathBuf>,

    /// Prints the syntax tree of every file.
    #[arg(long)]
    show_tree: bool,

    /// Prints the lowered program before running it.
    #[arg(long)]
    show_program: bool,

    /// Writes the control flow graph of the entry function, in Graphviz dot
    /// format, to this file.
    #[arg(long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if args.paths.is_empty() {
        Repl::new(&args).run()
    } else {
        run_batch(&args)
    }
}

fn run_batch(args: &Args) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for path in &args.paths {
        collect_sources(path, &mut files)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
    }
    anyhow::ensure!(!files.is_empty(), "no .prl files found");

    let mut trees = Vec::with_capacity(files.len());
    for file in &files {
        let tree = SyntaxTree::load(file)
            .with_context(|| format!("failed to read `{}`", file.display()))?;
        if args.show_tree {
            print!("{}", tree::print_unit_string(tree.root()));
        }
        trees.push(tree);
    }

    let compilation = Compilation::new(trees);
    if args.show_program {
        compilation.emit_tree(&mut io::stdout().lock())?;
    }
    if let Some(path) = &args.cfg {
        let mut file = fs::File::create(path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;
        compilation.emit_control_flow_graph(&mut file)?;
    }

    let mut globals = HashMap::new();
    let EvaluationResult { diagnostics, value } = compilation.evaluate(&mut globals)?;
    if !diagnostics.is_empty() {
        print_diagnostics(&diagnostics);
        std::process::exit(1);
    }
    print_value(value.as_ref());
    Ok(())
}

/// Pushes `path`, or every `.prl` file below it in sorted order.
fn collect_sources(path: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    if !path.is_dir() {
        files.push(path.to_owned());
        return Ok(());
    }
    let mut entries = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_sources(&entry, files)?;
        } else if entry.extension().is_some_and(|ext| ext == "prl") {
            files.push(entry);
        }
    }
    Ok(())
}

fn print_value(value: Option<&Value>) {
    match value {
        None | Some(Value::Void) => {}
        Some(value) => println!("{value}"),
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let mut stderr = io::stderr().lock();
    for diagnostic in diagnostics {
        // Best effort: there is nowhere left to report a failing stderr.
        _ = write_diagnostic(&mut stderr, diagnostic);
    }
}

fn write_diagnostic(w: &mut impl Write, diagnostic: &Diagnostic) -> io::Result<()> {
    let Some(source) = &diagnostic.source else {
        return writeln!(w, "error: {diagnostic}");
    };
    let location = source.location(diagnostic.span);
    let path = source
        .path()
        .map_or_else(|| "<input>".to_owned(), |p| p.display().to_string());
    writeln!(w, "{path}:{location}: error: {diagnostic}")?;

    let line = source.line_span(location.start.line - 1);
    let text = line.substr(source.as_str());
    let column = location.start.column - 1;
    let width = if location.end.line == location.start.line {
        location.end.column.saturating_sub(location.start.column).max(1)
    } else {
        text.chars().count().saturating_sub(column).max(1)
    };
    writeln!(w, "    {text}")?;
    writeln!(w, "    {:column$}{}", "", "^".repeat(width))
}

/// The interactive loop. Each complete submission is compiled on top of the
/// previous successful one.
struct Repl {
    show_tree: bool,
    show_program: bool,
    previous: Option<Arc<Compilation>>,
    globals: HashMap<Variable, Value>,
}

impl Repl {
    fn new(args: &Args) -> Repl {
        Repl {
            show_tree: args.show_tree,
            show_program: args.show_program,
            previous: None,
            globals: HashMap::new(),
        }
    }

    /// Reads submissions from standard input. The same locked reader is
    /// handed to the evaluator, so `readInput` consumes the following lines.
    fn run(mut self) -> anyhow::Result<()> {
        let mut input = io::stdin().lock();
        let mut text = String::new();
        let mut line = String::new();

        loop {
            print!("{}", if text.is_empty() { "» " } else { "· " });
            io::stdout().flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                println!();
                return Ok(());
            }
            let line = line.trim_end_matches(['\r', '\n']);

            if text.is_empty() {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(command) = line.trim().strip_prefix('#') {
                    if !self.meta_command(command, &mut input)? {
                        return Ok(());
                    }
                    continue;
                }
            }

            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line);

            if !is_complete_submission(&text) {
                continue;
            }
            let submission = std::mem::take(&mut text);
            self.evaluate(SyntaxTree::parse_text(submission), &mut input);
        }
    }

    fn evaluate(&mut self, tree: SyntaxTree, input: &mut impl BufRead) {
        if self.show_tree {
            print!("{}", tree::print_unit_string(tree.root()));
        }
        let compilation = Compilation::new_script(self.previous.clone(), vec![tree]);
        if self.show_program {
            _ = compilation.emit_tree(&mut io::stdout().lock());
        }

        match compilation.evaluate_with(&mut self.globals, input, io::stdout().lock()) {
            Ok(EvaluationResult { diagnostics, value }) if diagnostics.is_empty() => {
                print_value(value.as_ref());
                self.previous = Some(Arc::new(compilation));
            }
            Ok(EvaluationResult { diagnostics, .. }) => print_diagnostics(&diagnostics),
            Err(error) => {
                eprintln!("runtime error: {error}");
                // The declarations are sound, so later submissions may use them.
                self.previous = Some(Arc::new(compilation));
            }
        }
    }

    /// Runs a `#command`. Returns `false` when the session should end.
    fn meta_command(&mut self, command: &str, input: &mut impl BufRead) -> anyhow::Result<bool> {
        let (name, argument) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(n, a)| (n, a.trim()));
        match name {
            "showTree" => {
                self.show_tree = !self.show_tree;
                println!("syntax trees {}", if self.show_tree { "on" } else { "off" });
            }
            "showProgram" => {
                self.show_program = !self.show_program;
                let state = if self.show_program { "on" } else { "off" };
                println!("bound trees {state}");
            }
            "cls" => print!("\x1b[2J\x1b[H"),
            "reset" => {
                self.previous = None;
                self.globals.clear();
            }
            "load" => match SyntaxTree::load(argument) {
                Ok(tree) => self.evaluate(tree, input),
                Err(error) => eprintln!("error: cannot load `{argument}`: {error}"),
            },
            "ls" => {
                if let Some(previous) = &self.previous {
                    for symbol in previous.symbols() {
                        println!("{symbol}");
                    }
                }
            }
            "dump" => {
                let function = self
                    .previous
                    .as_ref()
                    .and_then(|previous| Some((previous, previous.function(argument)?)));
                match function {
                    Some((previous, function)) => {
                        previous.emit_function_tree(&function, &mut io::stdout().lock())?;
                    }
                    None => eprintln!("error: function '{argument}' does not exist"),
                }
            }
            "exit" => return Ok(false),
            "help" => {
                println!("#showTree #showProgram #cls #reset #load <path> #ls #dump <function> #exit");
            }
            _ => eprintln!("error: unknown command '#{name}', try #help"),
        }
        Ok(true)
    }
}

/// Two trailing blank lines force a submission; otherwise it must parse
/// without running out of input.
fn is_complete_submission(text: &str) -> bool {
    if text.ends_with("\n\n") {
        return true;
    }
    SyntaxTree::parse_text(text).is_complete()
}
