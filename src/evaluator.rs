use std::{
    collections::HashMap,
    fs,
    io::{self, BufRead, Write},
    path::Path,
    rc::Rc,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    ast::{BinaryOperator, UnaryOperator},
    binder::BoundProgram,
    bound::{BoundBinaryOperator, BoundExpr, BoundStmt, BoundUnaryOperator, Label},
    symbols::{Builtin, Function, Type, Variable, VariableKind},
    value::Value,
};

/// A fault that aborts evaluation. Unlike diagnostics these are found only
/// while running the program.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot convert '{value}' to type '{ty}'")]
    InvalidConversion { value: String, ty: Type },
    #[error("variable '{0}' is used before it is assigned")]
    UninitializedVariable(String),
    #[error("function '{function}' got an invalid argument: {value}")]
    InvalidArgument { function: &'static str, value: i64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

type LabelMap = HashMap<Label, usize>;

/// Runs a lowered program.
///
/// Global variables live in a map owned by the caller so that values survive
/// across REPL submissions. Locals and parameters live in one frame per
/// active call.
pub struct Evaluator<'a, R, W> {
    program: &'a BoundProgram,
    globals: &'a mut HashMap<Variable, Value>,
    frames: Vec<HashMap<Variable, Value>>,
    label_maps: HashMap<Function, Rc<LabelMap>>,
    last_value: Option<Value>,
    random: Option<StdRng>,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Evaluator<'a, R, W> {
    pub fn new(
        program: &'a BoundProgram,
        globals: &'a mut HashMap<Variable, Value>,
        input: R,
        output: W,
    ) -> Self {
        Evaluator {
            program,
            globals,
            frames: Vec::new(),
            label_maps: HashMap::new(),
            last_value: None,
            random: None,
            input,
            output,
        }
    }

    /// Runs the entry function of the program and returns the value of its
    /// last declaration or expression statement, or the value it returned.
    pub fn evaluate(mut self) -> Result<Option<Value>, RuntimeError> {
        let program = self.program;
        let Some(entry) = program.entry_point() else {
            return Ok(None);
        };
        let _span = tracing::debug_span!("evaluate", entry = %entry.name).entered();

        self.frames.push(HashMap::new());
        let returned = self.evaluate_function(entry)?;
        self.frames.pop();
        self.output.flush()?;

        Ok(returned.or(self.last_value))
    }

    fn evaluate_function(&mut self, function: &Function) -> Result<Option<Value>, RuntimeError> {
        let program = self.program;
        let body = program
            .body(function)
            .unwrap_or_else(|| unreachable!("function {} has no body", function.name));
        let labels = self.label_map(function, body);

        let mut index = 0;
        while let Some(stmt) = body.get(index) {
            match stmt {
                BoundStmt::VariableDeclaration {
                    variable,
                    initializer,
                } => {
                    let value = self.evaluate_expr(initializer)?;
                    self.record(&value);
                    self.assign(variable, value);
                    index += 1;
                }
                BoundStmt::Expression(expr) => {
                    let value = self.evaluate_expr(expr)?;
                    self.record(&value);
                    index += 1;
                }
                BoundStmt::Goto(label) => index = labels[label],
                BoundStmt::ConditionalGoto {
                    label,
                    condition,
                    jump_if_true,
                } => {
                    if self.evaluate_expr(condition)?.as_bool() == *jump_if_true {
                        index = labels[label];
                    } else {
                        index += 1;
                    }
                }
                BoundStmt::Label(_) => index += 1,
                BoundStmt::Return(expr) => {
                    return expr.as_ref().map(|e| self.evaluate_expr(e)).transpose();
                }
                BoundStmt::Block(_)
                | BoundStmt::If { .. }
                | BoundStmt::While { .. }
                | BoundStmt::For { .. } => {
                    unreachable!("structured statement in lowered body: {stmt:?}")
                }
            }
        }
        Ok(None)
    }

    /// Maps each label to the index of the statement following it.
    fn label_map(&mut self, function: &Function, body: &[BoundStmt]) -> Rc<LabelMap> {
        let map = self.label_maps.entry(function.clone()).or_insert_with(|| {
            let map = body
                .iter()
                .enumerate()
                .filter_map(|(i, stmt)| match stmt {
                    BoundStmt::Label(label) => Some((label.clone(), i + 1)),
                    _ => None,
                })
                .collect();
            Rc::new(map)
        });
        Rc::clone(map)
    }

    /// Keeps the value of statements run directly by the entry function.
    fn record(&mut self, value: &Value) {
        if self.frames.len() == 1 {
            self.last_value = Some(value.clone());
        }
    }

    fn assign(&mut self, variable: &Variable, value: Value) {
        if variable.kind == VariableKind::Global {
            self.globals.insert(variable.clone(), value);
        } else {
            let frame = self
                .frames
                .last_mut()
                .unwrap_or_else(|| unreachable!("no active call frame"));
            frame.insert(variable.clone(), value);
        }
    }

    fn lookup(&self, variable: &Variable) -> Result<Value, RuntimeError> {
        let value = if variable.kind == VariableKind::Global {
            self.globals.get(variable)
        } else {
            self.frames.last().and_then(|frame| frame.get(variable))
        };
        value
            .cloned()
            .ok_or_else(|| RuntimeError::UninitializedVariable(variable.name.clone()))
    }

    fn evaluate_expr(&mut self, expr: &BoundExpr) -> Result<Value, RuntimeError> {
        match expr {
            BoundExpr::Error => unreachable!("error expressions are never evaluated"),
            BoundExpr::Literal(value) => Ok(value.clone()),
            BoundExpr::Variable(variable) => self.lookup(variable),
            BoundExpr::Assignment { variable, value } => {
                let value = self.evaluate_expr(value)?;
                self.assign(variable, value.clone());
                Ok(value)
            }
            BoundExpr::Unary { op, operand } => {
                let operand = self.evaluate_expr(operand)?;
                Ok(evaluate_unary(op, &operand))
            }
            BoundExpr::Binary { left, op, right } => {
                // `&&` and `||` evaluate both operands.
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                evaluate_binary(op, &left, &right)
            }
            BoundExpr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.evaluate_expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match function.builtin {
                    Some(builtin) => self.call_builtin(builtin, args),
                    None => self.call_function(function, args),
                }
            }
            BoundExpr::Conversion { ty, expr } => {
                let value = self.evaluate_expr(expr)?;
                convert(value, *ty)
            }
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, RuntimeError> {
        tracing::trace!(function = %function.name, depth = self.frames.len(), "call");
        let frame = function.parameters.iter().cloned().zip(args).collect();
        self.frames.push(frame);
        let result = self.evaluate_function(function);
        self.frames.pop();
        Ok(result?.unwrap_or(Value::Void))
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let value = match (builtin, args.as_slice()) {
            (Builtin::Print, [text]) => {
                writeln!(self.output, "{}", text.as_str())?;
                Value::Void
            }
            (Builtin::ReadInput, []) => {
                let mut line = String::new();
                self.input.read_line(&mut line)?;
                let len = line.trim_end_matches(['\r', '\n']).len();
                line.truncate(len);
                Value::Str(line)
            }
            (Builtin::Random, [max]) => {
                let max = max.as_int();
                if max < 0 {
                    return Err(RuntimeError::InvalidArgument {
                        function: builtin.name(),
                        value: max,
                    });
                }
                if max == 0 {
                    Value::Int(0)
                } else {
                    let rng = self.random.get_or_insert_with(StdRng::from_entropy);
                    Value::Int(rng.gen_range(0..max))
                }
            }
            (Builtin::Min, [a, b]) => Value::Int(a.as_int().min(b.as_int())),
            (Builtin::Max, [a, b]) => Value::Int(a.as_int().max(b.as_int())),
            (Builtin::FileExists, [path]) => Value::Bool(Path::new(path.as_str()).is_file()),
            (Builtin::ReadFile, [path]) => Value::Str(fs::read_to_string(path.as_str())?),
            (Builtin::WriteFile, [path, contents]) => {
                fs::write(path.as_str(), contents.as_str())?;
                Value::Void
            }
            (builtin, args) => unreachable!("{builtin:?} called with {} arguments", args.len()),
        };
        Ok(value)
    }
}

fn evaluate_unary(op: &BoundUnaryOperator, operand: &Value) -> Value {
    match op.op {
        UnaryOperator::Identity => Value::Int(operand.as_int()),
        UnaryOperator::Negation => Value::Int(operand.as_int().wrapping_neg()),
        UnaryOperator::LogicalNot => Value::Bool(!operand.as_bool()),
        UnaryOperator::OnesComplement => Value::Int(!operand.as_int()),
    }
}

fn evaluate_binary(
    op: &BoundBinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    use BinaryOperator::*;
    let value = match (op.op, left, right) {
        (Eq, l, r) => Value::Bool(l == r),
        (NotEq, l, r) => Value::Bool(l != r),
        (Add, Value::Str(l), Value::Str(r)) => Value::Str(format!("{l}{r}")),
        (BitwiseAnd | LogicalAnd, Value::Bool(l), Value::Bool(r)) => Value::Bool(*l & *r),
        (BitwiseOr | LogicalOr, Value::Bool(l), Value::Bool(r)) => Value::Bool(*l | *r),
        (BitwiseXor, Value::Bool(l), Value::Bool(r)) => Value::Bool(*l ^ *r),
        (op, Value::Int(l), Value::Int(r)) => {
            let (l, r) = (*l, *r);
            match op {
                Add => Value::Int(l.wrapping_add(r)),
                Sub => Value::Int(l.wrapping_sub(r)),
                Mul => Value::Int(l.wrapping_mul(r)),
                Div | Rem if r == 0 => return Err(RuntimeError::DivisionByZero),
                Div => Value::Int(l.wrapping_div(r)),
                Rem => Value::Int(l.wrapping_rem(r)),
                BitwiseAnd => Value::Int(l & r),
                BitwiseOr => Value::Int(l | r),
                BitwiseXor => Value::Int(l ^ r),
                Less => Value::Bool(l < r),
                LessEq => Value::Bool(l <= r),
                Greater => Value::Bool(l > r),
                GreaterEq => Value::Bool(l >= r),
                LogicalAnd | LogicalOr | Eq | NotEq => {
                    unreachable!("{op:?} is not defined on int")
                }
            }
        }
        (op, l, r) => unreachable!("{op:?} is not defined on {l:?} and {r:?}"),
    };
    Ok(value)
}

/// Performs a conversion the binder accepted. Conversions out of `any` and
/// out of `string` are checked here.
fn convert(value: Value, ty: Type) -> Result<Value, RuntimeError> {
    let invalid = |value: &str| RuntimeError::InvalidConversion {
        value: value.to_owned(),
        ty,
    };
    let converted = match (ty, value) {
        (Type::Any, value)
        | (Type::Bool, value @ Value::Bool(_))
        | (Type::Int, value @ Value::Int(_)) => value,
        (Type::String, value) => Value::Str(value.to_string()),
        (Type::Bool, Value::Int(i)) => Value::Bool(i != 0),
        (Type::Bool, Value::Str(s)) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Value::Bool(true),
            t if t.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(invalid(&s)),
        },
        (Type::Int, Value::Bool(b)) => Value::Int(i64::from(b)),
        (Type::Int, Value::Str(s)) => match s.trim().parse() {
            Ok(i) => Value::Int(i),
            Err(_) => return Err(invalid(&s)),
        },
        (_, value) => return Err(invalid(&value.to_string())),
    };
    Ok(converted)
}
