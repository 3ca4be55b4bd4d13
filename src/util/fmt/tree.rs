use std::io::{self, Write};

use super::{sp, to_string};
use crate::{ast::*, value::Value};

pub fn print_unit_string(unit: &CompilationUnit) -> String {
    to_string(|w| print_unit(w, unit))
}

pub fn print_expr_string(expr: &Expr) -> String {
    to_string(|w| print_expr(w, 0, expr))
}

pub fn print_unit(w: &mut impl Write, unit: &CompilationUnit) -> io::Result<()> {
    for member in &unit.members {
        match member {
            Member::Function(decl) => print_function(w, 0, decl)?,
            Member::GlobalStatement(stmt) => print_stmt(w, 0, stmt)?,
        }
    }
    Ok(())
}

fn print_function(w: &mut impl Write, i: usize, decl: &FunctionDecl) -> io::Result<()> {
    sp(w, i)?;
    write!(w, "function {}(", Name(&decl.name))?;
    for (idx, param) in decl.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{}: {}", Name(&param.name), Name(&param.ty))?;
    }
    write!(w, ")")?;
    if let Some(ty) = &decl.return_ty {
        write!(w, ": {}", Name(ty))?;
    }
    writeln!(w, " ({})", decl.span)?;
    print_block(w, i + 1, &decl.body)
}

fn print_block(w: &mut impl Write, i: usize, block: &Block) -> io::Result<()> {
    sp(w, i)?;
    writeln!(w, "block ({})", block.span)?;
    for stmt in &block.stmts {
        print_stmt(w, i + 1, stmt)?;
    }
    Ok(())
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> io::Result<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Block(block) => return print_block(w, i, block),
        StmtKind::Expr(expr) => return print_expr(w, i, expr),
        _ => sp(w, i)?,
    }
    match &stmt.kind {
        StmtKind::VarDecl {
            name,
            ty,
            initializer,
        } => {
            write!(w, "let {}", Name(name))?;
            if let Some(ty) = ty {
                write!(w, ": {}", Name(ty))?;
            }
            writeln!(w, " ({span})")?;
            print_expr(w, i + 1, initializer)?;
        }
        StmtKind::If {
            condition,
            then_arm,
            elif_arms,
            else_arm,
        } => {
            writeln!(w, "if ({span})")?;
            print_expr(w, i + 1, condition)?;
            print_stmt(w, i + 1, then_arm)?;
            for arm in elif_arms {
                sp(w, i + 1)?;
                writeln!(w, "elif ({})", arm.span)?;
                print_expr(w, i + 2, &arm.condition)?;
                print_stmt(w, i + 2, &arm.body)?;
            }
            if let Some(else_arm) = else_arm {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_stmt(w, i + 2, else_arm)?;
            }
        }
        StmtKind::While { condition, body } => {
            writeln!(w, "while ({span})")?;
            print_expr(w, i + 1, condition)?;
            print_stmt(w, i + 1, body)?;
        }
        StmtKind::For {
            variable,
            lower,
            upper,
            body,
        } => {
            writeln!(w, "for ({span})")?;
            sp(w, i + 1)?;
            writeln!(w, "ident {} ({})", Name(variable), variable.span)?;
            print_expr(w, i + 1, lower)?;
            print_expr(w, i + 1, upper)?;
            print_stmt(w, i + 1, body)?;
        }
        StmtKind::Break => writeln!(w, "break ({span})")?,
        StmtKind::Continue => writeln!(w, "continue ({span})")?,
        StmtKind::Return(expr) => {
            writeln!(w, "return ({span})")?;
            if let Some(expr) = expr {
                print_expr(w, i + 1, expr)?;
            }
        }
        StmtKind::Block(_) | StmtKind::Expr(_) => unreachable!("printed above"),
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Literal(value) => {
            let kind = match value {
                Value::Bool(_) => "bool",
                Value::Int(_) => "int",
                Value::Str(_) => "string",
                Value::Void => "void",
            };
            writeln!(w, "{kind} {} ({span})", value.to_literal())?;
        }
        ExprKind::Name(ident) => writeln!(w, "name {} ({span})", Name(ident))?,
        ExprKind::Assignment { target, op, value } => {
            write!(w, "assign {}", Name(target))?;
            if let Some(op) = op {
                write!(w, " {op:?}")?;
            }
            writeln!(w, " ({span})")?;
            print_expr(w, i + 1, value)?;
        }
        ExprKind::Unary { op, expr: inner, .. } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, i + 1, inner)?;
        }
        ExprKind::Binary { op, lhs, rhs, .. } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Paren(inner) => {
            writeln!(w, "paren ({span})")?;
            print_expr(w, i + 1, inner)?;
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call {} ({span})", Name(callee))?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
    }
    Ok(())
}

/// Displays an identifier, marking the ones synthesized by error recovery.
struct Name<'a>(&'a Ident);

impl std::fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_missing() {
            f.write_str("<missing>")
        } else {
            f.write_str(&self.0.name)
        }
    }
}
