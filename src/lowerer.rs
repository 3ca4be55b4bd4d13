use crate::{
    ast::BinaryOperator,
    bound::{BoundBinaryOperator, BoundExpr, BoundStmt, Label},
    symbols::{Function, Type, Variable, VariableKind},
    value::Value,
};

/// Rewrites a bound body into a flat list of declarations, expression
/// statements, labels, gotos and returns.
///
/// Labels are numbered from 1 on every call; break and continue labels
/// assigned by the binder are kept.
pub fn lower(function: &Function, body: BoundStmt) -> Vec<BoundStmt> {
    let mut lowerer = Lowerer { label_counter: 0 };
    let rewritten = lowerer.rewrite(body);
    let flat = flatten(rewritten);
    tracing::trace!(
        function = %function.name,
        labels = lowerer.label_counter,
        statements = flat.len(),
        "lowered"
    );
    flat
}

struct Lowerer {
    label_counter: usize,
}

impl Lowerer {
    fn generate_label(&mut self) -> Label {
        self.label_counter += 1;
        Label::new(format!("label{}", self.label_counter))
    }

    fn rewrite(&mut self, stmt: BoundStmt) -> BoundStmt {
        match stmt {
            BoundStmt::Block(stmts) => {
                BoundStmt::Block(stmts.into_iter().map(|s| self.rewrite(s)).collect())
            }
            BoundStmt::If {
                condition,
                then_arm,
                else_arm: None,
            } => {
                // goto end unless <condition>
                // <then>
                // end:
                let end = self.generate_label();
                BoundStmt::Block(vec![
                    BoundStmt::ConditionalGoto {
                        label: end.clone(),
                        condition,
                        jump_if_true: false,
                    },
                    self.rewrite(*then_arm),
                    BoundStmt::Label(end),
                ])
            }
            BoundStmt::If {
                condition,
                then_arm,
                else_arm: Some(else_arm),
            } => {
                // goto else unless <condition>
                // <then>
                // goto end
                // else:
                // <else>
                // end:
                let else_label = self.generate_label();
                let end = self.generate_label();
                BoundStmt::Block(vec![
                    BoundStmt::ConditionalGoto {
                        label: else_label.clone(),
                        condition,
                        jump_if_true: false,
                    },
                    self.rewrite(*then_arm),
                    BoundStmt::Goto(end.clone()),
                    BoundStmt::Label(else_label),
                    self.rewrite(*else_arm),
                    BoundStmt::Label(end),
                ])
            }
            BoundStmt::While {
                condition,
                body,
                break_label,
                continue_label,
            } => {
                // goto continue
                // body:
                // <body>
                // continue:
                // goto body if <condition>
                // break:
                let body_label = self.generate_label();
                BoundStmt::Block(vec![
                    BoundStmt::Goto(continue_label.clone()),
                    BoundStmt::Label(body_label.clone()),
                    self.rewrite(*body),
                    BoundStmt::Label(continue_label),
                    BoundStmt::ConditionalGoto {
                        label: body_label,
                        condition,
                        jump_if_true: true,
                    },
                    BoundStmt::Label(break_label),
                ])
            }
            BoundStmt::For {
                variable,
                lower,
                upper,
                body,
                break_label,
                continue_label,
            } => self.rewrite_for(variable, lower, upper, *body, break_label, continue_label),
            other => other,
        }
    }

    /// `for (v = lower to upper) body` becomes
    ///
    /// ```text
    /// let v = lower
    /// let upperBound = upper
    /// while v <= upperBound
    /// {
    ///     body
    ///   continue:
    ///     v = v + 1
    /// }
    /// ```
    fn rewrite_for(
        &mut self,
        variable: Variable,
        lower: BoundExpr,
        upper: BoundExpr,
        body: BoundStmt,
        break_label: Label,
        continue_label: Label,
    ) -> BoundStmt {
        let kind = match variable.kind {
            VariableKind::Global => VariableKind::Global,
            _ => VariableKind::Local,
        };
        let upper_bound = Variable::new("upperBound", true, Type::Int, kind);

        let condition = BoundExpr::Binary {
            left: Box::new(BoundExpr::Variable(variable.clone())),
            op: int_operator(BinaryOperator::LessEq),
            right: Box::new(BoundExpr::Variable(upper_bound.clone())),
        };
        let increment = BoundStmt::Expression(BoundExpr::Assignment {
            variable: variable.clone(),
            value: Box::new(BoundExpr::Binary {
                left: Box::new(BoundExpr::Variable(variable.clone())),
                op: int_operator(BinaryOperator::Add),
                right: Box::new(BoundExpr::Literal(Value::Int(1))),
            }),
        });

        let while_continue = self.generate_label();
        let while_loop = BoundStmt::While {
            condition,
            body: Box::new(BoundStmt::Block(vec![
                body,
                BoundStmt::Label(continue_label),
                increment,
            ])),
            break_label,
            continue_label: while_continue,
        };

        self.rewrite(BoundStmt::Block(vec![
            BoundStmt::VariableDeclaration {
                variable,
                initializer: lower,
            },
            BoundStmt::VariableDeclaration {
                variable: upper_bound,
                initializer: upper,
            },
            while_loop,
        ]))
    }
}

fn int_operator(op: BinaryOperator) -> &'static BoundBinaryOperator {
    BoundBinaryOperator::bind(op, Type::Int, Type::Int)
        .unwrap_or_else(|| unreachable!("{op:?} is defined on int"))
}

/// Splices nested blocks into one list, keeping statement order.
fn flatten(stmt: BoundStmt) -> Vec<BoundStmt> {
    let mut flat = Vec::new();
    let mut stack = vec![stmt];
    while let Some(stmt) = stack.pop() {
        match stmt {
            BoundStmt::Block(stmts) => stack.extend(stmts.into_iter().rev()),
            other => flat.push(other),
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use lowerer;

        fn test_if_without_else() {
            let unit = "let a = 1 if (a == 1) a = 2";
            let tree_ok = "
                  let a = 1
                  goto label1 unless a == 1
                  a = 2
                label1:
            ";
        }

        fn test_if_with_else() {
            let unit = r#"if (1 < 2) { print("yes") } else { print("no") }"#;
            let tree_ok = r#"
                  goto label1 unless 1 < 2
                  print("yes")
                  goto label2
                label1:
                  print("no")
                label2:
            "#;
        }

        fn test_elif_chain() {
            let unit = "let a = 1 if (a == 1) a = 2 elif (a == 2) a = 3 else a = 4";
            let tree_ok = "
                  let a = 1
                  goto label1 unless a == 1
                  a = 2
                  goto label2
                label1:
                  goto label3 unless a == 2
                  a = 3
                  goto label4
                label3:
                  a = 4
                label4:
                label2:
            ";
        }

        fn test_while_with_break() {
            let unit = "let a = 0 while (a < 3) { a += 1 if (a == 2) break }";
            let tree_ok = "
                  let a = 0
                  goto continue1
                label1:
                  a = a + 1
                  goto label2 unless a == 2
                  goto break1
                label2:
                continue1:
                  goto label1 if a < 3
                break1:
            ";
        }

        fn test_for() {
            let unit = "for (i = 1 to 3) print(string(i))";
            let tree_ok = "
                  let i = 1
                  let upperBound = 3
                  goto label1
                label2:
                  print(string(i))
                continue1:
                  i = i + 1
                label1:
                  goto label2 if i <= upperBound
                break1:
            ";
        }

        fn test_nested_loops_get_distinct_labels() {
            let unit = "while (true) { while (false) continue break }";
            let tree_ok = "
                  goto continue1
                label1:
                  goto continue2
                label2:
                  goto continue2
                continue2:
                  goto label2 if false
                break2:
                  goto break1
                continue1:
                  goto label1 if true
                break1:
            ";
        }
    );
}
