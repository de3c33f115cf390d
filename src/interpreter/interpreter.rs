use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io::Write,
    path::Path,
    rc::Rc,
};

use log::{debug, info};

use crate::{
    ast::{
        decls::{DeclId, DeclKind},
        stmts::{BinaryOperator, Expr, ExprKind, ExprPtr, Stmt, StmtKind, UnaryOperator},
        types::{BuiltinClass, TypeId},
        visitor::StmtVisitor,
    },
    diagnostics::{
        consumer::LogDiagnosticConsumer,
        diagnostics::DiagnosticsEngine,
        source::SourceManager,
        text_map::DiagTextMap,
    },
    errors::errors::{Error, ErrorImpl},
    lexer::lexer::tokenize,
    options::CompilerOptions,
    parser::parser::{parse_source, parse_statements},
    sema::sema::Sema,
    Position,
};

use super::{
    storage::DeclStorage,
    value::{binary_arith, convert, step, unary_arith, Value},
};

/// A native closure standing in for an `extern` function.
pub type HostFunction = Rc<dyn Fn(&[Value]) -> Result<Value, Error>>;

/// Where control goes after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return,
    Goto(DeclId),
}

/// A storage location: a declaration plus the element and field indices
/// leading into it.
#[derive(Debug, Clone)]
struct Place {
    decl: DeclId,
    path: Vec<usize>,
}

/// Tree-walking interpreter over the analysed AST.
///
/// The interpreter owns the [`Sema`] it runs, so REPL input can be analysed
/// against everything declared so far. Values are kept in a [`DeclStorage`]
/// keyed by declaration.
pub struct Interpreter {
    pub sema: Sema,
    sources: Rc<RefCell<SourceManager>>,
    storage: DeclStorage,
    host_functions: HashMap<DeclId, HostFunction>,
    output: Rc<RefCell<dyn Write>>,
    initializing: HashSet<DeclId>,
    last_value: Option<Value>,
    flow: Flow,
    return_value: Option<Value>,
    call_depth: usize,
    statement_count: usize,
}

impl Interpreter {
    /// Creates an interpreter whose diagnostics go to the `log` facade and
    /// whose printing builtins write to stdout.
    ///
    /// # Arguments
    ///
    /// * `options` - Session options. `diag_text_path` replaces the builtin
    ///   diagnostic texts.
    ///
    /// # Returns
    ///
    /// The interpreter, or an error if the diagnostic text map could not be
    /// read.
    pub fn new(options: CompilerOptions) -> Result<Self, Error> {
        let sources = Rc::new(RefCell::new(SourceManager::new()));
        let text_map = match &options.diag_text_path {
            Some(path) => DiagTextMap::from_file(path)?,
            None => DiagTextMap::builtin(),
        };
        let diags = DiagnosticsEngine::new(
            Rc::new(text_map),
            Box::new(LogDiagnosticConsumer::new(Rc::clone(&sources))),
        );

        Interpreter::with_sema(Sema::new(diags, options), sources, Rc::new(RefCell::new(std::io::stdout())))
    }

    /// Creates an interpreter around an existing Sema. Printing builtins
    /// write to `output`.
    pub fn with_sema(
        sema: Sema,
        sources: Rc<RefCell<SourceManager>>,
        output: Rc<RefCell<dyn Write>>,
    ) -> Result<Self, Error> {
        let mut interpreter = Interpreter {
            sema,
            sources,
            storage: DeclStorage::new(),
            host_functions: HashMap::new(),
            output,
            initializing: HashSet::new(),
            last_value: None,
            flow: Flow::Normal,
            return_value: None,
            call_depth: 0,
            statement_count: 0,
        };
        interpreter.register_print_builtins()?;
        Ok(interpreter)
    }

    pub fn sources(&self) -> Rc<RefCell<SourceManager>> {
        Rc::clone(&self.sources)
    }

    pub fn global_count(&self) -> usize {
        self.storage.global_count()
    }

    /// Binds a native closure to the function `name`.
    ///
    /// An `extern` prototype of the same name and signature that is already
    /// declared at the top level is bound in place; otherwise a new
    /// intrinsic declaration is made visible to later code.
    ///
    /// # Arguments
    ///
    /// * `name` - Function name as written in source.
    /// * `result` - Builtin class of the result.
    /// * `params` - Builtin classes of the parameters.
    /// * `function` - Receives the already converted argument values.
    ///
    /// # Returns
    ///
    /// The declaration the closure is bound to.
    pub fn register_function(
        &mut self,
        name: &str,
        result: BuiltinClass,
        params: &[BuiltinClass],
        function: impl Fn(&[Value]) -> Result<Value, Error> + 'static,
    ) -> Result<DeclId, Error> {
        let result = self.sema.ast.get_builtin_type(result);
        let params: Vec<TypeId> = params
            .iter()
            .map(|class| self.sema.ast.get_builtin_type(*class))
            .collect();

        let decl = match self.find_prototype(name, result, &params) {
            Some(decl) => decl,
            None => self.sema.declare_intrinsic(name, result, &params)?,
        };

        debug!("interpreter: bound host function `{}`", name);
        self.host_functions.insert(decl, Rc::new(function));
        Ok(decl)
    }

    fn find_prototype(&self, name: &str, result: TypeId, params: &[TypeId]) -> Option<DeclId> {
        let ast = &self.sema.ast;
        ast.decls(ast.translation_unit()).find(|candidate| {
            let decl = ast.get_decl(*candidate);
            if decl.kind != DeclKind::Function || !decl.has_name(name) || decl.body().is_some() {
                return false;
            }
            let Some((candidate_result, candidate_params, _)) = decl.ty.and_then(|ty| ast.function_signature(ty)) else {
                return false;
            };
            ast.is_same_type(candidate_result, result)
                && candidate_params.len() == params.len()
                && candidate_params
                    .iter()
                    .zip(params)
                    .all(|(a, b)| ast.is_same_type(*a, *b))
        })
    }

    fn register_print_builtins(&mut self) -> Result<(), Error> {
        let output = Rc::clone(&self.output);
        self.register_function("print_int", BuiltinClass::Void, &[BuiltinClass::I64], move |args| {
            write_output(&output, &args[0].as_int().to_string())
        })?;

        let output = Rc::clone(&self.output);
        self.register_function("print_float", BuiltinClass::Void, &[BuiltinClass::F64], move |args| {
            write_output(&output, &args[0].as_float().to_string())
        })?;

        let output = Rc::clone(&self.output);
        self.register_function("print_char", BuiltinClass::Void, &[BuiltinClass::Char], move |args| {
            let byte = args[0].as_int() as u8;
            write_output(&output, &(byte as char).to_string())
        })?;

        Ok(())
    }

    // Driver entry points

    /// Analyses `content` as a translation unit and initializes its
    /// globals. Nothing is run.
    pub fn load_source(&mut self, name: &str, content: &str) -> Result<(), Error> {
        self.sources.borrow_mut().add_file(name, content);
        parse_source(&mut self.sema, name, content)?;
        self.initialize_globals()
    }

    /// Loads `content` and calls the configured entry function.
    ///
    /// # Returns
    ///
    /// What the entry function returned, or `EntryNotFound` if the unit
    /// does not define it.
    pub fn run_source(&mut self, name: &str, content: &str) -> Result<Value, Error> {
        self.load_source(name, content)?;
        let entry = self.sema.options.entry_function.clone();
        let result = self.call_function(&entry, &[]);
        self.storage.collect_garbage(&self.sema.ast);
        result
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Value, Error> {
        let (name, content) = self.sources.borrow_mut().load_file(path)?;
        self.run_source(&name, &content)
    }

    /// Calls the function `name`, which may be qualified with `::`.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, Error> {
        let function = self.find_function(name).ok_or_else(|| {
            Error::new(
                ErrorImpl::EntryNotFound {
                    name: name.to_string(),
                },
                Position::null(),
            )
        })?;

        let expected = self.sema.ast.get_decl(function).params().len();
        if expected != args.len() {
            return Err(Error::new(
                ErrorImpl::ParameterCountMismatch {
                    function: name.to_string(),
                    expected,
                    received: args.len(),
                },
                Position::null(),
            ));
        }

        info!("interpreter: calling `{}`", name);
        self.call(function, args.to_vec(), &Position::null())
    }

    fn find_function(&self, path: &str) -> Option<DeclId> {
        let ast = &self.sema.ast;
        let mut context = ast.translation_unit();
        let mut segments = path.split("::").peekable();

        while let Some(segment) = segments.next() {
            let found = ast.decls(context).find(|decl| {
                let decl = ast.get_decl(*decl);
                decl.has_name(segment)
                    && match segments.peek() {
                        Some(_) => decl.kind == DeclKind::Module,
                        None => decl.kind == DeclKind::Function,
                    }
            })?;
            if segments.peek().is_none() {
                return Some(found);
            }
            context = ast.as_decl_context(found)?;
        }
        None
    }

    /// Analyses and runs one line of REPL input.
    ///
    /// On any failure, the declarations the line introduced are rolled
    /// back and the error flag is cleared; earlier declarations stay.
    ///
    /// # Returns
    ///
    /// The value of the last statement when it is an expression with a
    /// non-void result, `StatementFailed` if analysis reported errors, or
    /// the runtime error that stopped the line.
    pub fn run_statement(&mut self, line: &str) -> Result<Option<Value>, Error> {
        self.statement_count += 1;
        let name = format!("<stdin:{}>", self.statement_count);
        self.sources.borrow_mut().add_file(name.as_str(), line);

        let snapshot = self.sema.snapshot();
        let result = self.execute_line(&name, line);

        if result.is_err() {
            debug!("interpreter: rolling back `{}`", name);
            self.sema.rollback(&snapshot)?;
            self.reset_control_state();
        } else {
            self.sema.release_scopes(&snapshot);
        }
        self.storage.collect_garbage(&self.sema.ast);
        result
    }

    fn execute_line(&mut self, name: &str, line: &str) -> Result<Option<Value>, Error> {
        let tokens = tokenize(line.to_string(), Some(name.to_string()))?;
        let stmts = parse_statements(&mut self.sema, tokens, Rc::new(name.to_string()))?;
        if self.sema.has_errors() {
            return Err(Error::new(ErrorImpl::StatementFailed, Position(0, Rc::new(name.to_string()))));
        }

        let mut echo = None;
        for stmt in stmts {
            echo = match &stmt.kind {
                StmtKind::Expr(expr) => match self.evaluate(expr)? {
                    Value::Void => None,
                    value => Some(value),
                },
                _ => {
                    self.visit(&stmt)?;
                    None
                }
            };
            self.reset_control_state();
        }
        Ok(echo)
    }

    fn reset_control_state(&mut self) {
        self.flow = Flow::Normal;
        self.return_value = None;
        self.last_value = None;
        self.call_depth = 0;
        while self.storage.in_frame() {
            self.storage.pop_frame();
        }
    }

    // Globals

    fn initialize_globals(&mut self) -> Result<(), Error> {
        let mut pending = vec![self.sema.ast.translation_unit()];
        while let Some(context) = pending.pop() {
            let decls: Vec<DeclId> = self.sema.ast.decls(context).collect();
            for decl in decls {
                let kind = self.sema.ast.get_decl(decl).kind;
                match kind {
                    DeclKind::Var => self.ensure_global(decl)?,
                    DeclKind::Module => {
                        if let Some(inner) = self.sema.ast.as_decl_context(decl) {
                            pending.push(inner);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn is_global_var(&self, decl: DeclId) -> bool {
        let ast = &self.sema.ast;
        ast.get_decl(decl).kind == DeclKind::Var
            && ast.get_decl(decl).get_context().is_some_and(|context| {
                matches!(
                    ast.get_decl(context.decl()).kind,
                    DeclKind::TranslationUnit | DeclKind::Module
                )
            })
    }

    /// Runs the initializer of a global on first use, so globals may refer
    /// to ones declared after them.
    fn ensure_global(&mut self, decl: DeclId) -> Result<(), Error> {
        if self.storage.is_global(decl) {
            return Ok(());
        }
        if !self.initializing.insert(decl) {
            return Err(Error::invariant(format!(
                "initializer of `{}` depends on itself",
                self.sema.ast.get_decl(decl).name_str()
            )));
        }

        let value = self.initial_value(decl);
        self.initializing.remove(&decl);
        self.storage.declare_global(decl, value?);
        Ok(())
    }

    fn initial_value(&mut self, decl: DeclId) -> Result<Value, Error> {
        let (init, ty) = {
            let decl = self.sema.ast.get_decl(decl);
            (decl.init().cloned(), decl.ty)
        };
        match (init, ty) {
            (Some(init), _) => self.evaluate(&init),
            (None, Some(ty)) => Ok(Value::default_for(&self.sema.ast, ty)),
            (None, None) => Err(Error::new(
                ErrorImpl::UnresolvedType {
                    type_: self.sema.ast.get_decl(decl).name_str().to_string(),
                },
                self.sema.ast.get_decl(decl).span.start.clone(),
            )),
        }
    }

    // Places

    fn place_of(&mut self, expr: &Expr) -> Result<Place, Error> {
        match &expr.kind {
            ExprKind::DeclRef(decl) => {
                if self.is_global_var(*decl) {
                    self.ensure_global(*decl)?;
                }
                Ok(Place {
                    decl: *decl,
                    path: vec![],
                })
            }
            ExprKind::Paren(inner) => self.place_of(inner),
            ExprKind::Member { base, index, .. } => {
                let mut place = self.place_of(base)?;
                place.path.push(*index);
                Ok(place)
            }
            ExprKind::ArraySubscript { base, index } => {
                let mut place = self.place_of(base)?;
                let index = self.evaluate(index)?.as_int();
                let length = self
                    .sema
                    .ast
                    .array_info(base.ty)
                    .map_or(0, |(_, count)| count as usize);
                place.path.push(check_index(index, length, &expr.span.start)?);
                Ok(place)
            }
            _ => Err(Error::invariant(format!(
                "{} does not designate storage",
                expr.class()
            ))),
        }
    }

    fn read_place(&self, place: &Place, position: &Position) -> Result<Value, Error> {
        let mut value = self
            .storage
            .get(place.decl)
            .ok_or_else(|| self.dangling(place.decl, position))?;
        for index in &place.path {
            value = match value {
                Value::Aggregate(elements) => elements
                    .get(*index)
                    .ok_or_else(|| Error::invariant(format!("element {} is missing", index)))?,
                _ => return Err(Error::invariant("indexing into a scalar value")),
            };
        }
        Ok(value.clone())
    }

    fn write_place(&mut self, place: &Place, new_value: Value, position: &Position) -> Result<(), Error> {
        let dangling = self.dangling(place.decl, position);
        let mut value = self.storage.get_mut(place.decl).ok_or(dangling)?;
        for index in &place.path {
            value = match value {
                Value::Aggregate(elements) => elements
                    .get_mut(*index)
                    .ok_or_else(|| Error::invariant(format!("element {} is missing", index)))?,
                _ => return Err(Error::invariant("indexing into a scalar value")),
            };
        }
        *value = new_value;
        Ok(())
    }

    fn dangling(&self, decl: DeclId, position: &Position) -> Error {
        Error::new(
            ErrorImpl::DanglingDeclRef {
                name: self.sema.ast.get_decl(decl).name_str().to_string(),
            },
            position.clone(),
        )
    }

    fn class_of(&self, ty: TypeId, position: &Position) -> Result<BuiltinClass, Error> {
        self.sema.ast.arithmetic_class(ty).ok_or_else(|| {
            Error::new(
                ErrorImpl::UnresolvedType {
                    type_: self.sema.type_name(ty),
                },
                position.clone(),
            )
        })
    }

    // Calls

    fn call(&mut self, function: DeclId, args: Vec<Value>, position: &Position) -> Result<Value, Error> {
        if let Some(host) = self.host_functions.get(&function).cloned() {
            return host(&args);
        }

        let (body, params, result) = {
            let decl = self.sema.ast.get_decl(function);
            let result = decl
                .ty
                .and_then(|ty| self.sema.ast.function_signature(ty))
                .map(|(result, _, _)| result);
            (decl.body().cloned(), decl.params().to_vec(), result)
        };
        let Some(body) = body else {
            return Err(Error::new(
                ErrorImpl::UnboundExternal {
                    function: self.sema.ast.qualified_name(function),
                },
                position.clone(),
            ));
        };

        if self.call_depth >= self.sema.options.max_call_depth {
            return Err(Error::new(
                ErrorImpl::StackOverflow {
                    depth: self.call_depth,
                },
                position.clone(),
            ));
        }

        self.call_depth += 1;
        self.storage.push_frame();
        for (param, value) in params.into_iter().zip(args) {
            self.storage.declare(param, value);
        }

        let outcome = self.visit(&body);

        self.storage.pop_frame();
        self.call_depth -= 1;
        let flow = std::mem::replace(&mut self.flow, Flow::Normal);
        let returned = self.return_value.take();
        outcome?;

        if let Flow::Goto(label) = flow {
            return Err(Error::invariant(format!(
                "`goto {}` left its function",
                self.sema.ast.get_decl(label).name_str()
            )));
        }

        Ok(match (returned, result) {
            (Some(value), _) => value,
            (None, Some(result)) => Value::default_for(&self.sema.ast, result),
            (None, None) => Value::Void,
        })
    }

    // Statements

    /// Runs `stmts` in order, resuming at a label when a `goto` targets one
    /// of them.
    fn run_block(&mut self, stmts: &[Rc<Stmt>]) -> Result<(), Error> {
        let mut index = 0;
        while index < stmts.len() {
            self.visit(&stmts[index])?;
            index += 1;

            if let Flow::Goto(label) = self.flow {
                if let Some(target) = stmts.iter().position(|stmt| defines_label(stmt, label)) {
                    self.flow = Flow::Normal;
                    index = target;
                }
            }
            if self.flow != Flow::Normal {
                break;
            }
        }
        Ok(())
    }

    /// Runs one loop body. Returns whether the loop should keep going.
    fn run_loop_body(&mut self, body: &Stmt) -> Result<bool, Error> {
        self.visit(body)?;
        match self.flow {
            Flow::Break => {
                self.flow = Flow::Normal;
                Ok(false)
            }
            Flow::Continue => {
                self.flow = Flow::Normal;
                Ok(true)
            }
            Flow::Normal => Ok(true),
            Flow::Return | Flow::Goto(_) => Ok(false),
        }
    }

    fn condition(&mut self, cond: &Expr) -> Result<bool, Error> {
        Ok(self.evaluate(cond)?.is_truthy())
    }

    // Expressions

    fn assign(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Result<Value, Error> {
        let value = self.evaluate(rhs)?;
        let place = self.place_of(lhs)?;
        self.write_place(&place, value.clone(), &expr.span.start)?;
        Ok(value)
    }

    fn logical(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr) -> Result<Value, Error> {
        let left = self.condition(lhs)?;
        let result = match op {
            BinaryOperator::LAnd => left && self.condition(rhs)?,
            _ => left || self.condition(rhs)?,
        };
        Ok(Value::from_bool(result))
    }

    fn increment(&mut self, expr: &Expr, op: UnaryOperator, operand: &Expr) -> Result<Value, Error> {
        let position = &expr.span.start;
        let class = self.class_of(operand.ty, position)?;
        let place = self.place_of(operand)?;
        let old = self.read_place(&place, position)?;

        let delta = match op {
            UnaryOperator::PreInc | UnaryOperator::PostInc => 1,
            _ => -1,
        };
        let new = step(&old, class, delta);
        self.write_place(&place, new.clone(), position)?;
        Ok(if op.is_postfix() { old } else { new })
    }

    fn cast(&mut self, expr: &Expr, operand: &ExprPtr) -> Result<Value, Error> {
        let value = self.evaluate(operand)?;
        let (Some(from), Some(to)) = (
            self.sema.ast.arithmetic_class(operand.ty),
            self.sema.ast.arithmetic_class(expr.ty),
        ) else {
            return Ok(value);
        };
        Ok(convert(&value, from, to))
    }
}

/// Whether `expr` names a variable or a part of one. String literals are
/// lvalues too but have no storage behind them.
fn designates_storage(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::DeclRef(_) => expr.is_lvalue(),
        ExprKind::Paren(inner) => designates_storage(inner),
        ExprKind::Member { base, .. } | ExprKind::ArraySubscript { base, .. } => designates_storage(base),
        _ => false,
    }
}

fn defines_label(stmt: &Stmt, label: DeclId) -> bool {
    match &stmt.kind {
        StmtKind::Label {
            label: defined,
            sub_stmt,
        } => *defined == label || defines_label(sub_stmt, label),
        _ => false,
    }
}

fn check_index(index: i64, length: usize, position: &Position) -> Result<usize, Error> {
    if index < 0 || index as usize >= length {
        return Err(Error::new(
            ErrorImpl::IndexOutOfBounds { index, length },
            position.clone(),
        ));
    }
    Ok(index as usize)
}

fn write_output(output: &Rc<RefCell<dyn Write>>, text: &str) -> Result<Value, Error> {
    writeln!(output.borrow_mut(), "{}", text).map_err(|error| {
        Error::new(
            ErrorImpl::IoError {
                message: error.to_string(),
            },
            Position::null(),
        )
    })?;
    Ok(Value::Void)
}

impl StmtVisitor for Interpreter {
    type Value = Value;

    fn last_value(&mut self) -> &mut Option<Value> {
        &mut self.last_value
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        Err(Error::not_implemented(
            format!("interpreting {}", stmt.class()),
            stmt.span.start.clone(),
        ))
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        Err(Error::not_implemented(
            format!("interpreting {}", expr.class()),
            expr.span.start.clone(),
        ))
    }

    fn visit_null_stmt(&mut self, _stmt: &Stmt) -> Result<(), Error> {
        Ok(())
    }

    fn visit_compound_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Compound(stmts) => self.run_block(stmts),
            _ => Err(Error::invariant("compound statement without a body")),
        }
    }

    fn visit_decl_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::Decl(decls) = &stmt.kind else {
            return Err(Error::invariant("declaration statement without declarations"));
        };

        for decl in decls {
            if self.sema.ast.get_decl(*decl).kind != DeclKind::Var {
                continue;
            }
            if self.storage.in_frame() {
                let value = self.initial_value(*decl)?;
                self.storage.declare(*decl, value);
            } else {
                self.ensure_global(*decl)?;
            }
        }
        Ok(())
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::If {
            cond,
            then_stmt,
            else_stmt,
        } = &stmt.kind
        else {
            return Err(Error::invariant("malformed if statement"));
        };

        if self.condition(cond)? {
            self.visit(then_stmt)
        } else if let Some(else_stmt) = else_stmt {
            self.visit(else_stmt)
        } else {
            Ok(())
        }
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::While { cond, body } = &stmt.kind else {
            return Err(Error::invariant("malformed while statement"));
        };

        while self.condition(cond)? {
            if !self.run_loop_body(body)? {
                break;
            }
        }
        Ok(())
    }

    fn visit_do_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::Do { body, cond } = &stmt.kind else {
            return Err(Error::invariant("malformed do statement"));
        };

        while self.run_loop_body(body)? {
            if !self.condition(cond)? {
                break;
            }
        }
        Ok(())
    }

    fn visit_for_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::For {
            init,
            cond,
            inc,
            body,
        } = &stmt.kind
        else {
            return Err(Error::invariant("malformed for statement"));
        };

        if let Some(init) = init {
            self.visit(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.condition(cond)? {
                    break;
                }
            }
            if !self.run_loop_body(body)? {
                break;
            }
            if let Some(inc) = inc {
                self.evaluate(inc)?;
            }
        }
        Ok(())
    }

    fn visit_break_stmt(&mut self, _stmt: &Stmt) -> Result<(), Error> {
        self.flow = Flow::Break;
        Ok(())
    }

    fn visit_continue_stmt(&mut self, _stmt: &Stmt) -> Result<(), Error> {
        self.flow = Flow::Continue;
        Ok(())
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let StmtKind::Return(value) = &stmt.kind else {
            return Err(Error::invariant("malformed return statement"));
        };

        self.return_value = match value {
            Some(value) => Some(self.evaluate(value)?),
            None => None,
        };
        self.flow = Flow::Return;
        Ok(())
    }

    fn visit_label_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Label { sub_stmt, .. } => self.visit(sub_stmt),
            _ => Err(Error::invariant("malformed label statement")),
        }
    }

    fn visit_goto_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Goto(label) => {
                self.flow = Flow::Goto(*label);
                Ok(())
            }
            _ => Err(Error::invariant("malformed goto statement")),
        }
    }

    fn visit_integer_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::IntegerLiteral(value) = expr.kind else {
            return Err(Error::invariant("malformed integer literal"));
        };
        self.last_value = Some(Value::Integer(value));
        Ok(())
    }

    fn visit_floating_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::FloatingLiteral(value) = expr.kind else {
            return Err(Error::invariant("malformed floating literal"));
        };
        let value = match self.sema.ast.builtin_class(expr.ty) {
            Some(BuiltinClass::F32) => value as f32 as f64,
            _ => value,
        };
        self.last_value = Some(Value::Floating(value));
        Ok(())
    }

    fn visit_bool_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::BoolLiteral(value) = expr.kind else {
            return Err(Error::invariant("malformed bool literal"));
        };
        self.last_value = Some(Value::from_bool(value));
        Ok(())
    }

    fn visit_char_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::CharLiteral(value) = expr.kind else {
            return Err(Error::invariant("malformed char literal"));
        };
        self.last_value = Some(Value::Integer(value as i64));
        Ok(())
    }

    fn visit_string_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::StringLiteral(text) = &expr.kind else {
            return Err(Error::invariant("malformed string literal"));
        };
        let mut bytes: Vec<Value> = text.bytes().map(|byte| Value::Integer(byte as i64)).collect();
        bytes.push(Value::Integer(0));
        self.last_value = Some(Value::Aggregate(bytes));
        Ok(())
    }

    fn visit_decl_ref_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::DeclRef(decl) = expr.kind else {
            return Err(Error::invariant("malformed declaration reference"));
        };

        let kind = self.sema.ast.get_decl(decl).kind;
        let value = match kind {
            DeclKind::EnumConstant => Value::Integer(self.sema.ast.get_decl(decl).enum_value().unwrap_or(0)),
            DeclKind::Var | DeclKind::ParmVar => {
                if self.is_global_var(decl) {
                    self.ensure_global(decl)?;
                }
                self.storage
                    .get(decl)
                    .cloned()
                    .ok_or_else(|| self.dangling(decl, &expr.span.start))?
            }
            _ => {
                return Err(Error::not_implemented(
                    format!("`{}` used as a value", self.sema.ast.get_decl(decl).name_str()),
                    expr.span.start.clone(),
                ))
            }
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_overload_set_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        Err(Error::not_implemented(
            "overloaded function used as a value",
            expr.span.start.clone(),
        ))
    }

    fn visit_paren_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Paren(inner) = &expr.kind else {
            return Err(Error::invariant("malformed parenthesized expression"));
        };
        let value = self.evaluate(inner)?;
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_unary_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Unary { op, operand } = &expr.kind else {
            return Err(Error::invariant("malformed unary operator"));
        };

        let value = if op.is_increment_decrement() {
            self.increment(expr, *op, operand)?
        } else {
            let value = self.evaluate(operand)?;
            let class = match op {
                UnaryOperator::Not => BuiltinClass::Bool,
                _ => self.class_of(expr.ty, &expr.span.start)?,
            };
            unary_arith(*op, class, &value, &expr.span.start)?
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_binary_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Binary(binary) = &expr.kind else {
            return Err(Error::invariant("malformed binary operator"));
        };

        let value = match binary.op {
            BinaryOperator::Assign => self.assign(expr, &binary.lhs, &binary.rhs)?,
            op if op.is_logical() => self.logical(op, &binary.lhs, &binary.rhs)?,
            op => {
                let lhs = self.evaluate(&binary.lhs)?;
                let rhs = self.evaluate(&binary.rhs)?;
                let class = self.class_of(binary.lhs.ty, &expr.span.start)?;
                binary_arith(op, class, &lhs, &rhs, &expr.span.start)?
            }
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_compound_assign_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::CompoundAssign(assign) = &expr.kind else {
            return Err(Error::invariant("malformed compound assignment"));
        };
        let position = &expr.span.start;
        let op = assign
            .op
            .compound_base()
            .ok_or_else(|| Error::new(ErrorImpl::InvalidOpcode { opcode: assign.op.to_string() }, position.clone()))?;

        let rhs = self.evaluate(&assign.rhs)?;
        let place = self.place_of(&assign.lhs)?;
        let current = self.read_place(&place, position)?;

        let lhs_class = self.class_of(assign.lhs.ty, position)?;
        let computation = self.class_of(assign.computation_type, position)?;
        let rhs_class = self.class_of(assign.rhs.ty, position)?;

        let result = binary_arith(
            op,
            computation,
            &convert(&current, lhs_class, computation),
            &convert(&rhs, rhs_class, computation),
            position,
        )?;
        let result = convert(&result, computation, lhs_class);

        self.write_place(&place, result.clone(), position)?;
        self.last_value = Some(result);
        Ok(())
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return Err(Error::invariant("malformed call"));
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?);
        }
        let value = self.call(*callee, values, &expr.span.start)?;
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_member_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Member { base, index, .. } = &expr.kind else {
            return Err(Error::invariant("malformed member access"));
        };

        let value = if designates_storage(base) {
            let place = self.place_of(expr)?;
            self.read_place(&place, &expr.span.start)?
        } else {
            match self.evaluate(base)? {
                Value::Aggregate(mut fields) if *index < fields.len() => fields.swap_remove(*index),
                _ => return Err(Error::invariant("member access on a non-record value")),
            }
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_array_subscript_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::ArraySubscript { base, index } = &expr.kind else {
            return Err(Error::invariant("malformed array subscript"));
        };

        let value = if designates_storage(base) {
            let place = self.place_of(expr)?;
            self.read_place(&place, &expr.span.start)?
        } else {
            let aggregate = self.evaluate(base)?;
            let index = self.evaluate(index)?.as_int();
            match aggregate {
                Value::Aggregate(mut elements) => {
                    let index = check_index(index, elements.len(), &expr.span.start)?;
                    elements.swap_remove(index)
                }
                _ => return Err(Error::invariant("subscript of a non-array value")),
            }
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_conditional_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        let ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } = &expr.kind
        else {
            return Err(Error::invariant("malformed conditional operator"));
        };

        let value = if self.condition(cond)? {
            self.evaluate(then_expr)?
        } else {
            self.evaluate(else_expr)?
        };
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_cast_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        let Some(cast) = expr.as_cast() else {
            return Err(Error::invariant("malformed cast"));
        };
        let value = self.cast(expr, &cast.operand)?;
        self.last_value = Some(value);
        Ok(())
    }

    fn visit_recovery_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        Err(Error::invariant(format!(
            "recovery expression at offset {} reached the interpreter",
            expr.span.start.0
        )))
    }
}
