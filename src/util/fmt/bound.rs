//! Source-like rendering of bound and lowered trees.
//!
//! Literals are printed in their canonical source form, so that printed
//! literals lex back to equal tokens.

use std::io::{self, Write};

use super::{sp, to_string};
use crate::{
    bound::{BoundExpr, BoundStmt},
    symbols::Function,
};

/// Binding power of prefix operators.
const UNARY_PRECEDENCE: u8 = 13;

pub fn print_stmts_string(stmts: &[BoundStmt]) -> String {
    to_string(|w| stmts.iter().try_for_each(|stmt| print_stmt(w, 0, stmt)))
}

/// Prints a lowered function body, labels one level left of the statements.
pub fn print_body_string(stmts: &[BoundStmt]) -> String {
    to_string(|w| stmts.iter().try_for_each(|stmt| print_stmt(w, 1, stmt)))
}

pub fn print_expr_string(expr: &BoundExpr) -> String {
    to_string(|w| print_expr(w, expr))
}

pub fn print_function(
    w: &mut impl Write,
    function: &Function,
    body: &[BoundStmt],
) -> io::Result<()> {
    writeln!(w, "{function}")?;
    writeln!(w, "{{")?;
    for stmt in body {
        print_stmt(w, 1, stmt)?;
    }
    writeln!(w, "}}")
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &BoundStmt) -> io::Result<()> {
    match stmt {
        BoundStmt::Label(label) => {
            sp(w, i.saturating_sub(1))?;
            return writeln!(w, "{label}:");
        }
        _ => sp(w, i)?,
    }
    match stmt {
        BoundStmt::Block(stmts) => {
            writeln!(w, "{{")?;
            for stmt in stmts {
                print_stmt(w, i + 1, stmt)?;
            }
            sp(w, i)?;
            writeln!(w, "}}")?;
        }
        BoundStmt::VariableDeclaration {
            variable,
            initializer,
        } => {
            write!(w, "let {} = ", variable.name)?;
            print_expr(w, initializer)?;
            writeln!(w)?;
        }
        BoundStmt::If {
            condition,
            then_arm,
            else_arm,
        } => {
            write!(w, "if ")?;
            print_expr(w, condition)?;
            writeln!(w)?;
            print_nested(w, i, then_arm)?;
            if let Some(else_arm) = else_arm {
                sp(w, i)?;
                writeln!(w, "else")?;
                print_nested(w, i, else_arm)?;
            }
        }
        BoundStmt::While {
            condition, body, ..
        } => {
            write!(w, "while ")?;
            print_expr(w, condition)?;
            writeln!(w)?;
            print_nested(w, i, body)?;
        }
        BoundStmt::For {
            variable,
            lower,
            upper,
            body,
            ..
        } => {
            write!(w, "for {} = ", variable.name)?;
            print_expr(w, lower)?;
            write!(w, " to ")?;
            print_expr(w, upper)?;
            writeln!(w)?;
            print_nested(w, i, body)?;
        }
        BoundStmt::Label(_) => unreachable!("printed above"),
        BoundStmt::Goto(label) => writeln!(w, "goto {label}")?,
        BoundStmt::ConditionalGoto {
            label,
            condition,
            jump_if_true,
        } => {
            let keyword = if *jump_if_true { "if" } else { "unless" };
            write!(w, "goto {label} {keyword} ")?;
            print_expr(w, condition)?;
            writeln!(w)?;
        }
        BoundStmt::Return(expr) => {
            write!(w, "return")?;
            if let Some(expr) = expr {
                write!(w, " ")?;
                print_expr(w, expr)?;
            }
            writeln!(w)?;
        }
        BoundStmt::Expression(expr) => {
            print_expr(w, expr)?;
            writeln!(w)?;
        }
    }
    Ok(())
}

/// Blocks stay at the level of their parent; other bodies are indented.
fn print_nested(w: &mut impl Write, i: usize, stmt: &BoundStmt) -> io::Result<()> {
    match stmt {
        BoundStmt::Block(_) => print_stmt(w, i, stmt),
        _ => print_stmt(w, i + 1, stmt),
    }
}

pub fn print_expr(w: &mut impl Write, expr: &BoundExpr) -> io::Result<()> {
    match expr {
        BoundExpr::Error => write!(w, "?"),
        BoundExpr::Literal(value) => write!(w, "{}", value.to_literal()),
        BoundExpr::Variable(variable) => write!(w, "{}", variable.name),
        BoundExpr::Assignment { variable, value } => {
            write!(w, "{} = ", variable.name)?;
            print_expr(w, value)
        }
        BoundExpr::Unary { op, operand } => {
            write!(w, "{}", op.op.text())?;
            print_operand(w, operand, UNARY_PRECEDENCE, true)
        }
        BoundExpr::Binary { left, op, right } => {
            let precedence = op.op.precedence();
            print_operand(w, left, precedence, false)?;
            write!(w, " {} ", op.op.text())?;
            print_operand(w, right, precedence, true)
        }
        BoundExpr::Call { function, args } => {
            write!(w, "{}(", function.name)?;
            for (idx, arg) in args.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                print_expr(w, arg)?;
            }
            write!(w, ")")
        }
        BoundExpr::Conversion { ty, expr } => {
            write!(w, "{ty}(")?;
            print_expr(w, expr)?;
            write!(w, ")")
        }
    }
}

/// Operators are left associative, so a right operand of equal precedence
/// needs parentheses while a left one does not.
fn print_operand(
    w: &mut impl Write,
    operand: &BoundExpr,
    parent: u8,
    is_right: bool,
) -> io::Result<()> {
    let precedence = match operand {
        BoundExpr::Binary { op, .. } => op.op.precedence(),
        BoundExpr::Assignment { .. } => 0,
        _ => return print_expr(w, operand),
    };
    if precedence < parent || (is_right && precedence == parent) {
        write!(w, "(")?;
        print_expr(w, operand)?;
        write!(w, ")")
    } else {
        print_expr(w, operand)
    }
}
