use std::{collections::HashMap, sync::Arc};

use crate::{
    ast::{Block, Expr, ExprKind, FunctionDecl, Ident, Member, Stmt, StmtKind},
    bound::{BoundBinaryOperator, BoundExpr, BoundStmt, BoundUnaryOperator, Label},
    control_flow::ControlFlowGraph,
    conversion::Conversion,
    diagnostic::{Diagnostic, DiagnosticBag, Error},
    lowerer,
    scope::ScopeChain,
    symbols::{self, Declaration, Function, Symbol, Type, Variable, VariableKind},
    syntax_tree::SyntaxTree,
    text::{SourceText, Span},
};

/// Name of the implicit function wrapping global statements in script mode.
pub const SCRIPT_FUNCTION_NAME: &str = "$eval";
pub const MAIN_FUNCTION_NAME: &str = "main";

/// Top-level symbols and statements of one submission, linked to the
/// submissions before it.
#[derive(Debug)]
pub struct GlobalScope {
    pub previous: Option<Arc<GlobalScope>>,
    pub diagnostics: Vec<Diagnostic>,
    pub main_function: Option<Function>,
    pub script_function: Option<Function>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    pub statements: Vec<BoundStmt>,
}

impl GlobalScope {
    /// This scope followed by every previous one, newest first.
    pub fn chain(&self) -> impl Iterator<Item = &GlobalScope> {
        std::iter::successors(Some(self), |s| s.previous.as_deref())
    }
}

/// Lowered function bodies of one submission, linked to the programs of the
/// submissions before it.
#[derive(Debug)]
pub struct BoundProgram {
    pub previous: Option<Arc<BoundProgram>>,
    pub diagnostics: Vec<Diagnostic>,
    pub main_function: Option<Function>,
    pub script_function: Option<Function>,
    pub functions: HashMap<Function, Vec<BoundStmt>>,
}

impl BoundProgram {
    /// The function to run: `main` or the script function.
    pub fn entry_point(&self) -> Option<&Function> {
        self.main_function.as_ref().or(self.script_function.as_ref())
    }

    /// Finds the lowered body of the function, searching previous programs.
    pub fn body(&self, function: &Function) -> Option<&[BoundStmt]> {
        std::iter::successors(Some(self), |p| p.previous.as_deref())
            .find_map(|p| p.functions.get(function))
            .map(Vec::as_slice)
    }
}

/// Binds the global declarations of `trees` on top of `previous`.
///
/// Function signatures are bound before any statement so that functions can
/// be called before their declaration.
pub fn bind_global_scope(
    is_script: bool,
    previous: Option<Arc<GlobalScope>>,
    trees: &[SyntaxTree],
) -> GlobalScope {
    let _span = tracing::debug_span!("bind_global_scope", is_script).entered();
    let mut binder = Binder::new(is_script, create_parent_scope(previous.as_deref()), None);

    for tree in trees {
        binder.diagnostics.set_source(Some(Arc::clone(tree.source())));
        for member in &tree.root().members {
            if let Member::Function(decl) = member {
                binder.bind_function_declaration(decl, tree.source());
            }
        }
    }

    let mut statements = Vec::new();
    let mut first_global_statements = Vec::new();
    for tree in trees {
        binder.diagnostics.set_source(Some(Arc::clone(tree.source())));
        let mut first = true;
        for member in &tree.root().members {
            if let Member::GlobalStatement(stmt) = member {
                if first {
                    first_global_statements.push((Arc::clone(tree.source()), stmt.span));
                    first = false;
                }
                statements.push(binder.bind_global_statement(stmt));
            }
        }
    }

    let mut main_function = None;
    let mut script_function = None;
    if is_script {
        if !statements.is_empty() {
            script_function = Some(Function::new(SCRIPT_FUNCTION_NAME, Vec::new(), Type::Any, None));
        }
    } else {
        if first_global_statements.len() > 1 {
            for (source, span) in &first_global_statements {
                binder.diagnostics.set_source(Some(Arc::clone(source)));
                binder
                    .diagnostics
                    .report(*span, Error::OnlyOneFileCanHaveGlobalStatements);
            }
        }

        let user_main = binder
            .declared_functions
            .iter()
            .find(|f| f.name == MAIN_FUNCTION_NAME)
            .cloned();
        if let Some((main, decl)) = user_main
            .as_ref()
            .and_then(|main| Some((main, main.declaration.as_ref()?)))
        {
            binder.diagnostics.set_source(Some(Arc::clone(&decl.source)));
            if main.ty != Type::Void || !main.parameters.is_empty() {
                binder
                    .diagnostics
                    .report(decl.syntax.name.span, Error::MainMustHaveCorrectSignature);
            }
            if !statements.is_empty() {
                binder
                    .diagnostics
                    .report(decl.syntax.name.span, Error::CannotMixMainAndGlobalStatements);
            }
        }
        main_function = user_main.or_else(|| {
            (!statements.is_empty())
                .then(|| Function::new(MAIN_FUNCTION_NAME, Vec::new(), Type::Void, None))
        });
    }

    let mut diagnostics: Vec<_> = previous
        .iter()
        .flat_map(|p| p.diagnostics.iter().cloned())
        .collect();
    diagnostics.extend(binder.diagnostics.into_vec());
    tracing::debug!(
        functions = binder.declared_functions.len(),
        variables = binder.declared_variables.len(),
        statements = statements.len(),
        diagnostics = diagnostics.len(),
        "bound global scope"
    );

    GlobalScope {
        previous,
        diagnostics,
        main_function,
        script_function,
        functions: binder.declared_functions,
        variables: binder.declared_variables,
        statements,
    }
}

/// Binds and lowers every function body declared in `global`, plus the
/// implicit entry function of the global statements.
pub fn bind_program(
    is_script: bool,
    previous: Option<Arc<BoundProgram>>,
    global: &GlobalScope,
) -> BoundProgram {
    let _span = tracing::debug_span!("bind_program", is_script).entered();
    if !global.diagnostics.is_empty() {
        return BoundProgram {
            previous,
            diagnostics: global.diagnostics.clone(),
            main_function: None,
            script_function: None,
            functions: HashMap::new(),
        };
    }

    let mut diagnostics = DiagnosticBag::new();
    let mut functions = HashMap::new();

    for function in &global.functions {
        let Some(decl) = &function.declaration else {
            continue;
        };
        let mut binder =
            Binder::new(is_script, create_parent_scope(Some(global)), Some(function.clone()));
        binder.diagnostics.set_source(Some(Arc::clone(&decl.source)));
        let body = binder.bind_function_body(function, &decl.syntax.body);
        let lowered = lowerer::lower(function, body);

        if function.ty != Type::Void && !ControlFlowGraph::all_paths_return(&lowered) {
            binder
                .diagnostics
                .report(decl.syntax.name.span, Error::AllPathsMustReturn);
        }

        functions.insert(function.clone(), lowered);
        diagnostics.extend(binder.diagnostics.into_vec());
    }

    let entry = global
        .main_function
        .as_ref()
        .filter(|main| main.declaration.is_none())
        .or(global.script_function.as_ref());
    if let Some(entry) = entry {
        let body = lowerer::lower(entry, BoundStmt::Block(global.statements.clone()));
        functions.insert(entry.clone(), body);
    }

    tracing::debug!(
        functions = functions.len(),
        diagnostics = diagnostics.len(),
        "bound program"
    );

    BoundProgram {
        previous,
        diagnostics: diagnostics.into_vec(),
        main_function: global.main_function.clone(),
        script_function: global.script_function.clone(),
        functions,
    }
}

/// Builds the scopes a submission is bound in: a root scope with the
/// built-in functions, then one scope with every function and variable of
/// the previous submissions.
fn create_parent_scope(previous: Option<&GlobalScope>) -> ScopeChain {
    let mut chain = ScopeChain::new();
    for function in symbols::builtins() {
        chain.try_declare_function(function);
    }
    chain.push();

    let mut submissions: Vec<_> = previous.into_iter().flat_map(GlobalScope::chain).collect();
    submissions.reverse();
    for submission in submissions {
        for function in &submission.functions {
            chain.try_declare_function(function);
        }
        for variable in &submission.variables {
            chain.try_declare_variable(variable);
        }
    }
    chain
}

struct Binder {
    is_script: bool,
    /// The function whose body is being bound. `None` for global statements.
    function: Option<Function>,
    scope: ScopeChain,
    diagnostics: DiagnosticBag,
    /// Break and continue labels of the enclosing loops, innermost last.
    loop_stack: Vec<(Label, Label)>,
    label_counter: usize,
    declared_functions: Vec<Function>,
    declared_variables: Vec<Variable>,
}

impl Binder {
    fn new(is_script: bool, scope: ScopeChain, function: Option<Function>) -> Binder {
        Binder {
            is_script,
            function,
            scope,
            diagnostics: DiagnosticBag::new(),
            loop_stack: Vec::new(),
            label_counter: 0,
            declared_functions: Vec::new(),
            declared_variables: Vec::new(),
        }
    }

    fn bind_function_declaration(&mut self, decl: &Arc<FunctionDecl>, source: &Arc<SourceText>) {
        let mut parameters: Vec<Variable> = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = self.bind_type_clause(&param.ty);
            let name = &param.name;
            if parameters.iter().any(|p| p.name == *name.name) {
                self.diagnostics
                    .report(name.span, Error::ParameterAlreadyDeclared(name.name.clone()));
                continue;
            }
            let ordinal = parameters.len();
            parameters.push(Variable::new(
                &*name.name,
                true,
                ty,
                VariableKind::Parameter { ordinal },
            ));
        }

        let ty = decl
            .return_ty
            .as_ref()
            .map_or(Type::Void, |ty| self.bind_type_clause(ty));

        let declaration = Declaration {
            source: Arc::clone(source),
            syntax: Arc::clone(decl),
        };
        let function = Function::new(&*decl.name.name, parameters, ty, Some(declaration));
        if decl.name.is_missing() {
            return;
        }
        if self.scope.try_declare_function(&function) {
            self.declared_functions.push(function);
        } else {
            self.diagnostics.report(
                decl.name.span,
                Error::SymbolAlreadyDeclared(decl.name.name.clone()),
            );
        }
    }

    fn bind_function_body(&mut self, function: &Function, body: &Block) -> BoundStmt {
        self.scope.push();
        for param in &function.parameters {
            self.scope.try_declare_variable(param);
        }
        let body = self.bind_block(body);
        self.scope.pop();
        body
    }

    fn bind_type_clause(&mut self, ident: &Ident) -> Type {
        if ident.is_missing() {
            return Type::Error;
        }
        self.scope.lookup_type(&ident.name).unwrap_or_else(|| {
            self.diagnostics
                .report(ident.span, Error::UndefinedType(ident.name.clone()));
            Type::Error
        })
    }

    fn bind_global_statement(&mut self, stmt: &Stmt) -> BoundStmt {
        self.bind_stmt_internal(stmt, true)
    }

    fn bind_stmt(&mut self, stmt: &Stmt) -> BoundStmt {
        self.bind_stmt_internal(stmt, false)
    }

    fn bind_stmt_internal(&mut self, stmt: &Stmt, is_global: bool) -> BoundStmt {
        let result = match &stmt.kind {
            StmtKind::Block(block) => self.bind_block(block),
            StmtKind::VarDecl {
                name,
                ty,
                initializer,
            } => self.bind_variable_statement(name, ty.as_ref(), initializer),
            StmtKind::If {
                condition,
                then_arm,
                elif_arms,
                else_arm,
            } => {
                let condition = self.bind_expression_to(condition, Type::Bool);
                let then_arm = self.bind_stmt(then_arm);
                let elifs: Vec<_> = elif_arms
                    .iter()
                    .map(|arm| {
                        let condition = self.bind_expression_to(&arm.condition, Type::Bool);
                        (condition, self.bind_stmt(&arm.body))
                    })
                    .collect();
                let mut else_arm = else_arm.as_ref().map(|s| Box::new(self.bind_stmt(s)));
                // `elif` is sugar for an `if` nested in the else arm.
                for (condition, body) in elifs.into_iter().rev() {
                    else_arm = Some(Box::new(BoundStmt::If {
                        condition,
                        then_arm: Box::new(body),
                        else_arm,
                    }));
                }
                BoundStmt::If {
                    condition,
                    then_arm: Box::new(then_arm),
                    else_arm,
                }
            }
            StmtKind::While { condition, body } => {
                let condition = self.bind_expression_to(condition, Type::Bool);
                let (body, break_label, continue_label) = self.bind_loop_body(body);
                BoundStmt::While {
                    condition,
                    body: Box::new(body),
                    break_label,
                    continue_label,
                }
            }
            StmtKind::For {
                variable,
                lower,
                upper,
                body,
            } => {
                let lower = self.bind_expression_to(lower, Type::Int);
                let upper = self.bind_expression_to(upper, Type::Int);
                self.scope.push();
                let variable = self.bind_variable_declaration(variable, true, Type::Int);
                let (body, break_label, continue_label) = self.bind_loop_body(body);
                self.scope.pop();
                BoundStmt::For {
                    variable,
                    lower,
                    upper,
                    body: Box::new(body),
                    break_label,
                    continue_label,
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                let is_break = matches!(stmt.kind, StmtKind::Break);
                match self.loop_stack.last() {
                    Some((break_label, continue_label)) => {
                        let label = if is_break { break_label } else { continue_label };
                        BoundStmt::Goto(label.clone())
                    }
                    None => {
                        let keyword = if is_break { "break" } else { "continue" };
                        self.diagnostics
                            .report(stmt.span, Error::InvalidBreakOrContinue(keyword));
                        BoundStmt::Expression(BoundExpr::Error)
                    }
                }
            }
            StmtKind::Return(expr) => self.bind_return(stmt.span, expr.as_ref()),
            StmtKind::Expr(expr) => BoundStmt::Expression(self.bind_expression(expr, true)),
        };

        if !is_global || !self.is_script {
            if let BoundStmt::Expression(expr) = &result {
                let allowed = matches!(
                    expr,
                    BoundExpr::Error | BoundExpr::Assignment { .. } | BoundExpr::Call { .. }
                );
                if !allowed {
                    self.diagnostics
                        .report(stmt.span, Error::InvalidExpressionStatement);
                }
            }
        }

        result
    }

    fn bind_block(&mut self, block: &Block) -> BoundStmt {
        self.scope.push();
        let stmts = block.stmts.iter().map(|s| self.bind_stmt(s)).collect();
        self.scope.pop();
        BoundStmt::Block(stmts)
    }

    fn bind_variable_statement(
        &mut self,
        name: &Ident,
        ty: Option<&Ident>,
        initializer: &Expr,
    ) -> BoundStmt {
        let declared_ty = ty.map(|ty| self.bind_type_clause(ty));
        let bound = self.bind_expression(initializer, false);
        let ty = declared_ty.unwrap_or_else(|| bound.ty());
        let variable = self.bind_variable_declaration(name, false, ty);
        let initializer = self.bind_conversion(initializer.span, bound, ty, false);
        BoundStmt::VariableDeclaration {
            variable,
            initializer,
        }
    }

    fn bind_variable_declaration(&mut self, name: &Ident, read_only: bool, ty: Type) -> Variable {
        let kind = if self.function.is_none() {
            VariableKind::Global
        } else {
            VariableKind::Local
        };
        let variable = Variable::new(&*name.name, read_only, ty, kind);
        if name.is_missing() {
            return variable;
        }
        if !self.scope.try_declare_variable(&variable) {
            self.diagnostics
                .report(name.span, Error::VariableAlreadyDeclared(name.name.clone()));
        } else if self.function.is_none() && self.scope.depth() == GLOBAL_DEPTH {
            self.declared_variables.push(variable.clone());
        }
        variable
    }

    fn bind_loop_body(&mut self, body: &Stmt) -> (BoundStmt, Label, Label) {
        self.label_counter += 1;
        let break_label = Label::new(format!("break{}", self.label_counter));
        let continue_label = Label::new(format!("continue{}", self.label_counter));

        self.loop_stack
            .push((break_label.clone(), continue_label.clone()));
        let body = self.bind_stmt(body);
        self.loop_stack.pop();

        (body, break_label, continue_label)
    }

    fn bind_return(&mut self, span: Span, expr: Option<&Expr>) -> BoundStmt {
        let bound = expr.map(|e| (e.span, self.bind_expression(e, false)));
        match &self.function {
            None if self.is_script => BoundStmt::Return(bound.map(|(_, e)| e)),
            None => {
                self.diagnostics.report(span, Error::InvalidReturn);
                BoundStmt::Return(None)
            }
            Some(function) if function.ty == Type::Void => {
                if let Some((expr_span, _)) = bound {
                    let name = function.name.as_str().into();
                    self.diagnostics
                        .report(expr_span, Error::InvalidReturnExpression(name));
                }
                BoundStmt::Return(None)
            }
            Some(function) => {
                let return_ty = function.ty;
                match bound {
                    None => {
                        self.diagnostics
                            .report(span, Error::MissingReturnExpression(return_ty));
                        BoundStmt::Return(None)
                    }
                    Some((expr_span, bound)) => {
                        let converted = self.bind_conversion(expr_span, bound, return_ty, false);
                        BoundStmt::Return(Some(converted))
                    }
                }
            }
        }
    }

    /// Binds the expression. Unless `can_be_void`, a `void` result is
    /// reported and replaced by an error expression.
    fn bind_expression(&mut self, expr: &Expr, can_be_void: bool) -> BoundExpr {
        let result = self.bind_expression_internal(expr);
        if !can_be_void && result.ty() == Type::Void {
            self.diagnostics
                .report(expr.span, Error::ExpressionMustHaveValue);
            return BoundExpr::Error;
        }
        result
    }

    fn bind_expression_to(&mut self, expr: &Expr, ty: Type) -> BoundExpr {
        let bound = self.bind_expression(expr, false);
        self.bind_conversion(expr.span, bound, ty, false)
    }

    fn bind_conversion(
        &mut self,
        span: Span,
        expr: BoundExpr,
        ty: Type,
        allow_explicit: bool,
    ) -> BoundExpr {
        let from = expr.ty();
        let conversion = Conversion::classify(from, ty);

        if !conversion.exists() {
            if from != Type::Error && ty != Type::Error {
                self.diagnostics
                    .report(span, Error::CannotConvert { from, to: ty });
            }
            return BoundExpr::Error;
        }

        if !allow_explicit && conversion.is_explicit() {
            self.diagnostics
                .report(span, Error::CannotConvertImplicitly { from, to: ty });
        }

        if conversion.is_identity() {
            return expr;
        }
        BoundExpr::Conversion {
            ty,
            expr: Box::new(expr),
        }
    }

    fn bind_expression_internal(&mut self, expr: &Expr) -> BoundExpr {
        match &expr.kind {
            ExprKind::Literal(value) => BoundExpr::Literal(value.clone()),
            ExprKind::Name(ident) => self
                .bind_variable_reference(ident)
                .map_or(BoundExpr::Error, BoundExpr::Variable),
            ExprKind::Paren(inner) => self.bind_expression_internal(inner),
            ExprKind::Assignment { target, op, value } => {
                let bound_value = self.bind_expression(value, false);
                let Some(variable) = self.bind_variable_reference(target) else {
                    return BoundExpr::Error;
                };
                if variable.read_only {
                    self.diagnostics
                        .report(target.span, Error::CannotAssign(target.name.clone()));
                }

                let new_value = match op {
                    None => bound_value,
                    Some(op) => {
                        let value_ty = bound_value.ty();
                        if variable.ty == Type::Error || value_ty == Type::Error {
                            return BoundExpr::Error;
                        }
                        let Some(bound_op) = BoundBinaryOperator::bind(*op, variable.ty, value_ty)
                        else {
                            self.diagnostics.report(
                                expr.span,
                                Error::UndefinedBinaryOperator {
                                    op: op.text(),
                                    left: variable.ty,
                                    right: value_ty,
                                },
                            );
                            return BoundExpr::Error;
                        };
                        BoundExpr::Binary {
                            left: Box::new(BoundExpr::Variable(variable.clone())),
                            op: bound_op,
                            right: Box::new(bound_value),
                        }
                    }
                };

                let converted = self.bind_conversion(value.span, new_value, variable.ty, false);
                BoundExpr::Assignment {
                    variable,
                    value: Box::new(converted),
                }
            }
            ExprKind::Unary {
                op,
                op_span,
                expr: operand,
            } => {
                let bound = self.bind_expression(operand, false);
                let operand_ty = bound.ty();
                if operand_ty == Type::Error {
                    return BoundExpr::Error;
                }
                match BoundUnaryOperator::bind(*op, operand_ty) {
                    Some(bound_op) => BoundExpr::Unary {
                        op: bound_op,
                        operand: Box::new(bound),
                    },
                    None => {
                        self.diagnostics.report(
                            *op_span,
                            Error::UndefinedUnaryOperator {
                                op: op.text(),
                                operand: operand_ty,
                            },
                        );
                        BoundExpr::Error
                    }
                }
            }
            ExprKind::Binary {
                op,
                op_span,
                lhs,
                rhs,
            } => {
                let left = self.bind_expression(lhs, false);
                let right = self.bind_expression(rhs, false);
                let (left_ty, right_ty) = (left.ty(), right.ty());
                if left_ty == Type::Error || right_ty == Type::Error {
                    return BoundExpr::Error;
                }
                match BoundBinaryOperator::bind(*op, left_ty, right_ty) {
                    Some(bound_op) => BoundExpr::Binary {
                        left: Box::new(left),
                        op: bound_op,
                        right: Box::new(right),
                    },
                    None => {
                        self.diagnostics.report(
                            *op_span,
                            Error::UndefinedBinaryOperator {
                                op: op.text(),
                                left: left_ty,
                                right: right_ty,
                            },
                        );
                        BoundExpr::Error
                    }
                }
            }
            ExprKind::Call { callee, args } => self.bind_call(expr.span, callee, args),
        }
    }

    fn bind_call(&mut self, span: Span, callee: &Ident, args: &[Expr]) -> BoundExpr {
        if let [arg] = args {
            if let Some(ty) = self.scope.lookup_type(&callee.name) {
                let bound = self.bind_expression(arg, false);
                return self.bind_conversion(arg.span, bound, ty, true);
            }
        }

        let bound_args: Vec<_> = args.iter().map(|a| self.bind_expression(a, false)).collect();

        let function = match self.scope.lookup_function(&callee.name) {
            Some(Ok(function)) => function,
            Some(Err(_)) => {
                self.diagnostics
                    .report(callee.span, Error::NotAFunction(callee.name.clone()));
                return BoundExpr::Error;
            }
            None => {
                self.diagnostics
                    .report(callee.span, Error::UndefinedFunction(callee.name.clone()));
                return BoundExpr::Error;
            }
        };

        if args.len() != function.parameters.len() {
            self.diagnostics.report(
                span,
                Error::WrongArgumentCount {
                    name: callee.name.clone(),
                    expected: function.parameters.len(),
                    actual: args.len(),
                },
            );
            return BoundExpr::Error;
        }

        let args = bound_args
            .into_iter()
            .zip(args)
            .zip(&function.parameters)
            .map(|((bound, syntax), param)| self.bind_conversion(syntax.span, bound, param.ty, false))
            .collect();

        BoundExpr::Call { function, args }
    }

    fn bind_variable_reference(&mut self, ident: &Ident) -> Option<Variable> {
        if ident.is_missing() {
            return None;
        }
        match self.scope.lookup_variable(&ident.name) {
            Some(Ok(variable)) => Some(variable),
            Some(Err(_)) => {
                self.diagnostics
                    .report(ident.span, Error::NotAVariable(ident.name.clone()));
                None
            }
            None => {
                self.diagnostics
                    .report(ident.span, Error::UndefinedVariable(ident.name.clone()));
                None
            }
        }
    }
}

/// Depth of the scope chain while binding global statements: the root scope
/// of built-ins plus the submission scope.
const GLOBAL_DEPTH: usize = 2;

/// Lists the symbols visible after `scope`: its functions and variables and
/// those of previous submissions, nearest first, without shadowed names.
pub fn visible_symbols(scope: &GlobalScope) -> Vec<Symbol> {
    let mut seen = std::collections::HashSet::new();
    let mut symbols = Vec::new();
    for submission in scope.chain() {
        let functions = submission.functions.iter().cloned().map(Symbol::Function);
        let variables = submission.variables.iter().cloned().map(Symbol::Variable);
        for symbol in functions.chain(variables) {
            if seen.insert(symbol.name().to_owned()) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}
