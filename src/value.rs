use std::fmt;

use crate::symbols::Type;

/// A runtime value. Literal tokens and bound literals carry the same type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Void,
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Str(_) => Type::String,
            Value::Void => Type::Void,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => unreachable!("expected bool, got {other:?}"),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            other => unreachable!("expected int, got {other:?}"),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Value::Str(s) => s,
            other => unreachable!("expected string, got {other:?}"),
        }
    }

    /// Formats the value as source text which lexes back to an equal literal.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => f.write_str(s),
            Value::Void => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_formatting() {
        assert_eq!(Value::Bool(true).to_literal(), "true");
        assert_eq!(Value::Int(-42).to_literal(), "-42");
        assert_eq!(Value::from("say \"hi\"").to_literal(), r#""say ""hi""""#);
        assert_eq!(Value::from("say \"hi\"").to_string(), r#"say "hi""#);
    }

    #[test]
    fn test_types() {
        assert_eq!(Value::Bool(false).ty(), Type::Bool);
        assert_eq!(Value::Int(0).ty(), Type::Int);
        assert_eq!(Value::from("").ty(), Type::String);
        assert_eq!(Value::Void.ty(), Type::Void);
    }
}
