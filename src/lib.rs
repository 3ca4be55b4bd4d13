/// The lexer takes the source text, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The binder resolves names and types of an AST, producing the bound tree.
pub mod binder;

/// The lowerer rewrites structured control flow into labels and jumps.
pub mod lowerer;

/// The evaluator runs a lowered program.
pub mod evaluator;

/// Ties the phases together, across files and REPL submissions.
pub mod compilation;

pub mod ast;
pub mod bound;
pub mod control_flow;
pub mod conversion;
pub mod diagnostic;
pub mod scope;
pub mod symbols;
pub mod syntax_tree;
pub mod text;
pub mod token;
pub mod value;

pub mod util;
