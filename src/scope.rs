use std::collections::{hash_map::Entry, HashMap};

use crate::symbols::{Function, Symbol, Type, Variable};

/// A chain of lexical scopes, innermost last.
///
/// Lookup walks outward until the name is found. A name may be declared at
/// most once per scope, while inner scopes may shadow outer ones.
#[derive(Debug)]
pub struct ScopeChain {
    scopes: Vec<HashMap<Box<str>, Symbol>>,
}

impl ScopeChain {
    /// A chain with one (root) scope.
    pub fn new() -> ScopeChain {
        ScopeChain {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.scopes.len() > 1, "the root scope is never popped");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declares the symbol in the innermost scope. Fails, leaving the scope
    /// untouched, if the name is already declared there.
    pub fn try_declare(&mut self, symbol: Symbol) -> Result<(), Symbol> {
        let scope = self.scopes.last_mut().expect("scope chain is never empty");
        match scope.entry(symbol.name().into()) {
            Entry::Vacant(entry) => {
                entry.insert(symbol);
                Ok(())
            }
            Entry::Occupied(entry) => Err(entry.get().clone()),
        }
    }

    pub fn try_declare_variable(&mut self, variable: &Variable) -> bool {
        self.try_declare(Symbol::Variable(variable.clone())).is_ok()
    }

    pub fn try_declare_function(&mut self, function: &Function) -> bool {
        self.try_declare(Symbol::Function(function.clone())).is_ok()
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_variable(&self, name: &str) -> Option<Result<Variable, Symbol>> {
        self.lookup(name).map(|symbol| match symbol {
            Symbol::Variable(v) => Ok(v.clone()),
            other => Err(other.clone()),
        })
    }

    pub fn lookup_function(&self, name: &str) -> Option<Result<Function, Symbol>> {
        self.lookup(name).map(|symbol| match symbol {
            Symbol::Function(f) => Ok(f.clone()),
            other => Err(other.clone()),
        })
    }

    pub fn lookup_type(&self, name: &str) -> Option<Type> {
        match self.lookup(name) {
            Some(Symbol::Type(ty)) => Some(*ty),
            _ => Type::lookup(name),
        }
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        ScopeChain::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::VariableKind;

    fn local(name: &str) -> Variable {
        Variable::new(name, false, Type::Int, VariableKind::Local)
    }

    #[test]
    fn test_shadowing() {
        let mut chain = ScopeChain::new();
        let outer = local("x");
        assert!(chain.try_declare_variable(&outer));
        chain.push();
        let inner = local("x");
        assert!(chain.try_declare_variable(&inner));
        assert_eq!(chain.lookup_variable("x"), Some(Ok(inner)));
        chain.pop();
        assert_eq!(chain.lookup_variable("x"), Some(Ok(outer)));
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let mut chain = ScopeChain::new();
        let first = local("x");
        assert!(chain.try_declare_variable(&first));
        assert!(!chain.try_declare_variable(&local("x")));
        assert_eq!(chain.lookup_variable("x"), Some(Ok(first)));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut chain = ScopeChain::new();
        let print = crate::symbols::Builtin::Print.function();
        assert!(chain.try_declare_function(print));
        assert!(matches!(chain.lookup_variable("print"), Some(Err(_))));
        assert!(chain.lookup_function("missing").is_none());
        assert_eq!(chain.lookup_type("int"), Some(Type::Int));
    }
}
