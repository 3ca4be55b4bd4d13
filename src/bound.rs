use std::{fmt, sync::Arc};

use crate::{
    ast::{BinaryOperator, UnaryOperator},
    symbols::{Function, Type, Variable},
    value::Value,
};

/// A jump target. Labels are unique within one function body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(name: impl Into<Arc<str>>) -> Label {
        Label(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub enum BoundStmt {
    Block(Vec<BoundStmt>),
    VariableDeclaration {
        variable: Variable,
        initializer: BoundExpr,
    },
    If {
        condition: BoundExpr,
        then_arm: Box<BoundStmt>,
        else_arm: Option<Box<BoundStmt>>,
    },
    While {
        condition: BoundExpr,
        body: Box<BoundStmt>,
        break_label: Label,
        continue_label: Label,
    },
    For {
        variable: Variable,
        lower: BoundExpr,
        upper: BoundExpr,
        body: Box<BoundStmt>,
        break_label: Label,
        continue_label: Label,
    },
    Label(Label),
    Goto(Label),
    ConditionalGoto {
        label: Label,
        condition: BoundExpr,
        jump_if_true: bool,
    },
    Return(Option<BoundExpr>),
    Expression(BoundExpr),
}

#[derive(Clone, Debug)]
pub enum BoundExpr {
    /// Stands in for an expression that failed to bind.
    Error,
    Literal(Value),
    Variable(Variable),
    Assignment {
        variable: Variable,
        value: Box<BoundExpr>,
    },
    Unary {
        op: &'static BoundUnaryOperator,
        operand: Box<BoundExpr>,
    },
    Binary {
        left: Box<BoundExpr>,
        op: &'static BoundBinaryOperator,
        right: Box<BoundExpr>,
    },
    Call {
        function: Function,
        args: Vec<BoundExpr>,
    },
    Conversion {
        ty: Type,
        expr: Box<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn ty(&self) -> Type {
        match self {
            BoundExpr::Error => Type::Error,
            BoundExpr::Literal(value) => value.ty(),
            BoundExpr::Variable(variable) => variable.ty,
            BoundExpr::Assignment { value, .. } => value.ty(),
            BoundExpr::Unary { op, .. } => op.result,
            BoundExpr::Binary { op, .. } => op.result,
            BoundExpr::Call { function, .. } => function.ty,
            BoundExpr::Conversion { ty, .. } => *ty,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct BoundUnaryOperator {
    pub op: UnaryOperator,
    pub operand: Type,
    pub result: Type,
}

impl BoundUnaryOperator {
    const fn new(op: UnaryOperator, operand: Type, result: Type) -> Self {
        BoundUnaryOperator {
            op,
            operand,
            result,
        }
    }

    /// Resolves the operator for the operand type, if one is defined.
    pub fn bind(op: UnaryOperator, operand: Type) -> Option<&'static BoundUnaryOperator> {
        UNARY_OPERATORS
            .iter()
            .find(|o| o.op == op && o.operand == operand)
    }
}

static UNARY_OPERATORS: [BoundUnaryOperator; 4] = {
    use {Type::*, UnaryOperator::*};
    [
        BoundUnaryOperator::new(LogicalNot, Bool, Bool),
        BoundUnaryOperator::new(Identity, Int, Int),
        BoundUnaryOperator::new(Negation, Int, Int),
        BoundUnaryOperator::new(OnesComplement, Int, Int),
    ]
};

#[derive(Debug, PartialEq, Eq)]
pub struct BoundBinaryOperator {
    pub op: BinaryOperator,
    pub left: Type,
    pub right: Type,
    pub result: Type,
}

impl BoundBinaryOperator {
    const fn new(op: BinaryOperator, operands: Type, result: Type) -> Self {
        BoundBinaryOperator {
            op,
            left: operands,
            right: operands,
            result,
        }
    }

    /// Resolves the operator for the exact operand types. No conversions are
    /// considered.
    pub fn bind(
        op: BinaryOperator,
        left: Type,
        right: Type,
    ) -> Option<&'static BoundBinaryOperator> {
        BINARY_OPERATORS
            .iter()
            .find(|o| o.op == op && o.left == left && o.right == right)
    }
}

static BINARY_OPERATORS: [BoundBinaryOperator; 24] = {
    use {BinaryOperator::*, Type::*};
    [
        BoundBinaryOperator::new(Add, Int, Int),
        BoundBinaryOperator::new(Sub, Int, Int),
        BoundBinaryOperator::new(Mul, Int, Int),
        BoundBinaryOperator::new(Div, Int, Int),
        BoundBinaryOperator::new(Rem, Int, Int),
        BoundBinaryOperator::new(BitwiseAnd, Int, Int),
        BoundBinaryOperator::new(BitwiseOr, Int, Int),
        BoundBinaryOperator::new(BitwiseXor, Int, Int),
        BoundBinaryOperator::new(Eq, Int, Bool),
        BoundBinaryOperator::new(NotEq, Int, Bool),
        BoundBinaryOperator::new(Less, Int, Bool),
        BoundBinaryOperator::new(LessEq, Int, Bool),
        BoundBinaryOperator::new(Greater, Int, Bool),
        BoundBinaryOperator::new(GreaterEq, Int, Bool),
        BoundBinaryOperator::new(BitwiseAnd, Bool, Bool),
        BoundBinaryOperator::new(BitwiseOr, Bool, Bool),
        BoundBinaryOperator::new(BitwiseXor, Bool, Bool),
        BoundBinaryOperator::new(LogicalAnd, Bool, Bool),
        BoundBinaryOperator::new(LogicalOr, Bool, Bool),
        BoundBinaryOperator::new(Eq, Bool, Bool),
        BoundBinaryOperator::new(NotEq, Bool, Bool),
        BoundBinaryOperator::new(Add, String, String),
        BoundBinaryOperator::new(Eq, String, Bool),
        BoundBinaryOperator::new(NotEq, String, Bool),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_operator_table() {
        use BinaryOperator::*;
        let op = BoundBinaryOperator::bind(Add, Type::String, Type::String).unwrap();
        assert_eq!(op.result, Type::String);
        let op = BoundBinaryOperator::bind(Less, Type::Int, Type::Int).unwrap();
        assert_eq!(op.result, Type::Bool);
        assert!(BoundBinaryOperator::bind(Add, Type::Int, Type::String).is_none());
        assert!(BoundBinaryOperator::bind(Less, Type::Bool, Type::Bool).is_none());
        assert!(BoundBinaryOperator::bind(Sub, Type::String, Type::String).is_none());
        let op = BoundBinaryOperator::bind(NotEq, Type::String, Type::String).unwrap();
        assert_eq!(op.result, Type::Bool);
    }

    #[test]
    fn test_unary_operator_table() {
        use UnaryOperator::*;
        assert!(BoundUnaryOperator::bind(LogicalNot, Type::Bool).is_some());
        assert!(BoundUnaryOperator::bind(LogicalNot, Type::Int).is_none());
        assert!(BoundUnaryOperator::bind(OnesComplement, Type::Int).is_some());
        assert!(BoundUnaryOperator::bind(Negation, Type::String).is_none());
    }
}
