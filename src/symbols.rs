use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    sync::{Arc, LazyLock},
};

use crate::{ast, text::SourceText};

/// Type symbols. Each type exists exactly once, so equality is identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Assigned to erroneous expressions to suppress cascading diagnostics.
    Error,
    Any,
    Bool,
    Int,
    String,
    Void,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Error => "?",
            Type::Any => "any",
            Type::Bool => "bool",
            Type::Int => "int",
            Type::String => "string",
            Type::Void => "void",
        }
    }

    /// Resolves a type name as written in source.
    pub fn lookup(name: &str) -> Option<Type> {
        match name {
            "any" => Some(Type::Any),
            "bool" => Some(Type::Bool),
            "int" => Some(Type::Int),
            "string" => Some(Type::String),
            "void" => Some(Type::Void),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Global,
    Local,
    Parameter { ordinal: usize },
}

#[derive(Debug)]
pub struct VariableSymbol {
    pub name: String,
    pub read_only: bool,
    pub ty: Type,
    pub kind: VariableKind,
}

/// Shared handle to a variable symbol.
///
/// Equality and hashing go through the pointer: two variables with the same
/// name in different scopes are different variables.
#[derive(Clone, Debug)]
pub struct Variable(Arc<VariableSymbol>);

impl Variable {
    pub fn new(name: impl Into<String>, read_only: bool, ty: Type, kind: VariableKind) -> Variable {
        Variable(Arc::new(VariableSymbol {
            name: name.into(),
            read_only,
            ty,
            kind,
        }))
    }

    pub fn is_global(&self) -> bool {
        self.kind == VariableKind::Global
    }
}

impl Deref for Variable {
    type Target = VariableSymbol;

    fn deref(&self) -> &VariableSymbol {
        &self.0
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VariableKind::Parameter { .. } => write!(f, "{}: {}", self.name, self.ty),
            _ => write!(f, "let {}: {}", self.name, self.ty),
        }
    }
}

/// Where a user function was declared.
#[derive(Debug)]
pub struct Declaration {
    pub source: Arc<SourceText>,
    pub syntax: Arc<ast::FunctionDecl>,
}

#[derive(Debug)]
pub struct FunctionSymbol {
    pub name: String,
    pub parameters: Vec<Variable>,
    pub ty: Type,
    pub declaration: Option<Declaration>,
    pub builtin: Option<Builtin>,
}

/// Shared handle to a function symbol, compared by identity.
#[derive(Clone, Debug)]
pub struct Function(Arc<FunctionSymbol>);

impl Function {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Variable>,
        ty: Type,
        declaration: Option<Declaration>,
    ) -> Function {
        Function(Arc::new(FunctionSymbol {
            name: name.into(),
            parameters,
            ty,
            declaration,
            builtin: None,
        }))
    }
}

impl Deref for Function {
    type Target = FunctionSymbol;

    fn deref(&self) -> &FunctionSymbol {
        &self.0
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}(", self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        if self.ty != Type::Void {
            write!(f, ": {}", self.ty)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    Function(Function),
    Variable(Variable),
    Type(Type),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Function(f) => &f.name,
            Symbol::Variable(v) => &v.name,
            Symbol::Type(t) => t.name(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Function(function) => function.fmt(f),
            Symbol::Variable(variable) => variable.fmt(f),
            Symbol::Type(ty) => ty.fmt(f),
        }
    }
}

/// Functions provided by the runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    ReadInput,
    Random,
    Min,
    Max,
    FileExists,
    ReadFile,
    WriteFile,
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Print,
        Builtin::ReadInput,
        Builtin::Random,
        Builtin::Min,
        Builtin::Max,
        Builtin::FileExists,
        Builtin::ReadFile,
        Builtin::WriteFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::ReadInput => "readInput",
            Builtin::Random => "random",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::FileExists => "fileExists",
            Builtin::ReadFile => "readFile",
            Builtin::WriteFile => "writeFile",
        }
    }

    fn signature(self) -> (&'static [(&'static str, Type)], Type) {
        match self {
            Builtin::Print => (&[("text", Type::String)], Type::Void),
            Builtin::ReadInput => (&[], Type::String),
            Builtin::Random => (&[("max", Type::Int)], Type::Int),
            Builtin::Min | Builtin::Max => (&[("a", Type::Int), ("b", Type::Int)], Type::Int),
            Builtin::FileExists => (&[("path", Type::String)], Type::Bool),
            Builtin::ReadFile => (&[("path", Type::String)], Type::String),
            Builtin::WriteFile => (
                &[("path", Type::String), ("contents", Type::String)],
                Type::Void,
            ),
        }
    }

    /// Returns the function symbol of this built-in. The same symbol is
    /// returned on every call.
    pub fn function(self) -> &'static Function {
        &builtins()[self as usize]
    }
}

/// The fixed registry of built-in function symbols, in [`Builtin::ALL`]
/// order.
pub fn builtins() -> &'static [Function] {
    static BUILTINS: LazyLock<Vec<Function>> = LazyLock::new(|| {
        Builtin::ALL
            .iter()
            .map(|&builtin| {
                let (params, ty) = builtin.signature();
                let parameters = params
                    .iter()
                    .enumerate()
                    .map(|(ordinal, &(name, ty))| {
                        Variable::new(name, true, ty, VariableKind::Parameter { ordinal })
                    })
                    .collect();
                Function(Arc::new(FunctionSymbol {
                    name: builtin.name().to_owned(),
                    parameters,
                    ty,
                    declaration: None,
                    builtin: Some(builtin),
                }))
            })
            .collect()
    });
    &BUILTINS
}
