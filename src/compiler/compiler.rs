//! Main compiler module.
//!
//! This module contains the [`CodeGen`] visitor, which lowers the analysed
//! AST into the intermediate form of [`super::ir`], and the [`Compiler`]
//! driver, which runs parsing, lowering and verification for a file and
//! writes the result.

use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use log::{debug, info};

use crate::{
    ast::{
        context::AstContext,
        decls::{DeclId, DeclKind},
        stmts::{Expr, ExprKind, Stmt},
        types::{BuiltinClass, Type, TypeId},
        visitor::StmtVisitor,
    },
    diagnostics::{
        consumer::LogDiagnosticConsumer,
        diagnostics::DiagnosticsEngine,
        source::SourceManager,
        text_map::DiagTextMap,
    },
    errors::errors::{Error, ErrorImpl},
    options::CompilerOptions,
    parser::parser::parse_source,
    sema::{
        constant::evaluate_constant,
        sema::Sema,
    },
    Position,
};

use super::{
    expr,
    ir::{BlockId, Function, Global, GlobalInit, InstKind, Instruction, IrType, Module, Operand, Terminator},
    stdlib::declare_runtime,
    stmt,
    verifier::verify_module,
};

/// Branch targets of the innermost enclosing loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopTargets {
    pub break_block: BlockId,
    pub continue_block: BlockId,
}

/// Lowers one translation unit into an IR [`Module`].
///
/// The generator keeps a single insertion point, like an LLVM builder.
/// After a terminator the insertion point is cleared; anything emitted
/// while it is clear lands in a fresh block that nothing branches to, and
/// such blocks are pruned when the function is finished.
pub struct CodeGen<'a> {
    /// The analysed declarations being lowered
    pub ast: &'a AstContext,
    /// The module being built
    pub module: Module,

    function: Option<Function>,
    insertion: Option<BlockId>,
    alloca_count: usize,

    /// Stack slot of every parameter and local of the current function
    locals: HashMap<DeclId, Operand>,
    labels: HashMap<DeclId, BlockId>,
    loops: Vec<LoopTargets>,

    /// Module-level symbol of every function and global
    symbols: HashMap<DeclId, String>,
    string_count: usize,
    last_value: Option<Operand>,
}

impl<'a> CodeGen<'a> {
    /// Creates a code generator for the declarations in `ast`.
    ///
    /// # Arguments
    ///
    /// * `ast` - The analysed translation unit
    /// * `module_name` - Name of the produced module, usually the file name
    pub fn new(ast: &'a AstContext, module_name: &str) -> Self {
        CodeGen {
            ast,
            module: Module::new(module_name),
            function: None,
            insertion: None,
            alloca_count: 0,
            locals: HashMap::new(),
            labels: HashMap::new(),
            loops: vec![],
            symbols: HashMap::new(),
            string_count: 0,
            last_value: None,
        }
    }

    /// Lowers every function and global of the translation unit and its
    /// modules.
    ///
    /// All functions are declared before any body is lowered, so calls may
    /// refer to functions defined later in the unit.
    ///
    /// # Returns
    ///
    /// The finished module. It is not verified here.
    pub fn compile(mut self) -> Result<Module, Error> {
        let mut functions = vec![];
        let mut globals = vec![];
        self.collect_decls(self.ast.translation_unit().decl(), &mut functions, &mut globals);

        self.assign_symbols(&functions, &globals);

        for function in &functions {
            self.declare_function(*function)?;
        }
        for global in &globals {
            self.lower_global(*global)?;
        }
        for function in &functions {
            self.define_function(*function)?;
        }

        debug!(
            "codegen: lowered {} function(s) and {} global(s)",
            functions.len(),
            globals.len()
        );
        Ok(self.module)
    }

    fn collect_decls(&self, owner: DeclId, functions: &mut Vec<DeclId>, globals: &mut Vec<DeclId>) {
        let Some(context) = self.ast.as_decl_context(owner) else {
            return;
        };
        for decl in self.ast.decls(context) {
            match self.ast.get_decl(decl).kind {
                DeclKind::Function => functions.push(decl),
                DeclKind::Var => globals.push(decl),
                DeclKind::Module => self.collect_decls(decl, functions, globals),
                _ => {}
            }
        }
    }

    /// Qualified names become dotted symbols. Overloads sharing a name are
    /// told apart by their parameter types.
    fn assign_symbols(&mut self, functions: &[DeclId], globals: &[DeclId]) {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for function in functions {
            *by_name.entry(self.ast.qualified_name(*function)).or_default() += 1;
        }

        for function in functions {
            let qualified = self.ast.qualified_name(*function);
            let mut symbol = qualified.replace("::", ".");
            if by_name.get(&qualified).copied().unwrap_or(0) > 1 {
                for param in self.ast.get_decl(*function).params() {
                    let spelling = self
                        .ast
                        .get_decl(*param)
                        .ty
                        .map_or_else(|| String::from("?"), |ty| self.ast.type_name(ty));
                    symbol.push('.');
                    symbol.extend(spelling.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }));
                }
            }
            self.symbols.insert(*function, symbol);
        }

        for global in globals {
            let symbol = self.ast.qualified_name(*global).replace("::", ".");
            self.symbols.insert(*global, symbol);
        }
    }

    /// The module symbol of a function or global, declaring functions that
    /// were not seen at the top level, such as block-scope prototypes.
    pub fn symbol(&mut self, decl: DeclId) -> Result<String, Error> {
        if let Some(symbol) = self.symbols.get(&decl) {
            return Ok(symbol.clone());
        }
        if self.ast.get_decl(decl).kind != DeclKind::Function {
            return Err(Error::invariant(format!(
                "`{}` has no module symbol",
                self.ast.get_decl(decl).name_str()
            )));
        }

        let symbol = self.ast.qualified_name(decl).replace("::", ".");
        self.symbols.insert(decl, symbol.clone());
        if self.module.get_function(&symbol).is_none() {
            self.declare_function(decl)?;
        }
        Ok(symbol)
    }

    // Types

    /// Maps an AST type onto its IR layout.
    ///
    /// # Arguments
    ///
    /// * `ty` - The type to lower; sugar is looked through
    /// * `position` - Where the type is used, for error reporting
    ///
    /// # Returns
    ///
    /// The IR type, or `UnresolvedType` for a type that never resolved or
    /// has no value layout.
    pub fn lower_type(&self, ty: TypeId, position: &Position) -> Result<IrType, Error> {
        let lowered = match self.ast.get_type(self.ast.underlying_type(ty)) {
            Type::Builtin(class) => class_type(*class),
            Type::Enum(_) => match self.ast.arithmetic_class(ty) {
                Some(class) => class_type(class),
                None => return Err(self.unresolved(ty, position)),
            },
            Type::Array { element, count } => IrType::Array(Box::new(self.lower_type(*element, position)?), *count),
            Type::Record(record) => {
                let mut fields = vec![];
                for field in self.ast.record_fields(*record) {
                    let Some(field_ty) = self.ast.get_decl(field).ty else {
                        return Err(self.unresolved(ty, position));
                    };
                    fields.push(self.lower_type(field_ty, position)?);
                }
                IrType::Struct(fields)
            }
            _ => return Err(self.unresolved(ty, position)),
        };
        Ok(lowered)
    }

    fn unresolved(&self, ty: TypeId, position: &Position) -> Error {
        Error::new(
            ErrorImpl::UnresolvedType {
                type_: self.ast.type_name(ty),
            },
            position.clone(),
        )
    }

    /// The builtin class an expression computes in, for instruction
    /// selection.
    pub fn class_of(&self, ty: TypeId, position: &Position) -> Result<BuiltinClass, Error> {
        self.ast
            .arithmetic_class(ty)
            .ok_or_else(|| self.unresolved(ty, position))
    }

    // Functions and globals

    fn declare_function(&mut self, decl: DeclId) -> Result<(), Error> {
        let ast = self.ast;
        let function = ast.get_decl(decl);
        let position = function.span.start.clone();
        let Some((result, params, variadic)) = function.ty.and_then(|ty| ast.function_signature(ty)) else {
            return Err(Error::new(
                ErrorImpl::UnresolvedType {
                    type_: ast.qualified_name(decl),
                },
                position,
            ));
        };

        let result = self.lower_type(result, &position)?;
        let params = params
            .iter()
            .map(|param| self.lower_type(*param, &position))
            .collect::<Result<Vec<_>, Error>>()?;
        let symbol = self.symbol(decl)?;

        debug!("codegen: declare `{}`", symbol);
        self.module.add_function(Function::new(symbol, params, result, variadic));
        Ok(())
    }

    /// Lowers the body of a function, if it has one.
    ///
    /// Parameters are stored into stack slots on entry so they are
    /// addressed exactly like locals.
    fn define_function(&mut self, decl: DeclId) -> Result<(), Error> {
        let Some(body) = self.ast.get_decl(decl).body().cloned() else {
            return Ok(());
        };
        let symbol = self.symbol(decl)?;
        let Some(declared) = self.module.get_function(&symbol) else {
            return Err(Error::invariant(format!("`{}` was never declared", symbol)));
        };

        let mut function = Function::new(
            symbol.clone(),
            declared.params.clone(),
            declared.result.clone(),
            declared.variadic,
        );
        let entry = function.append_block("entry");
        self.function = Some(function);
        self.insertion = Some(entry);
        self.alloca_count = 0;
        self.locals.clear();
        self.labels.clear();
        self.loops.clear();

        let params = self.ast.get_decl(decl).params().to_vec();
        for (index, param) in params.into_iter().enumerate() {
            let value = self
                .current_function()?
                .param(index)
                .ok_or_else(|| Error::invariant(format!("`{}` has no parameter {}", symbol, index)))?;
            let slot = self.emit_alloca(value.ty.clone())?;
            self.emit_store(value, slot.clone())?;
            self.locals.insert(param, slot);
        }

        self.visit(&body)?;

        // Falling off the end returns the zero value of the result type
        if self.insertion.is_some() {
            let result = self.current_function()?.result.clone();
            let terminator = match result {
                IrType::Void => Terminator::Ret(None),
                ty => Terminator::Ret(Some(Operand::zero(ty))),
            };
            self.terminate(terminator)?;
        }

        let mut function = self
            .function
            .take()
            .ok_or_else(|| Error::invariant("function vanished while lowering"))?;
        let removed = function.remove_unreachable_blocks();
        if removed > 0 {
            debug!("codegen: dropped {} unreachable block(s) from `{}`", removed, symbol);
        }
        self.module.add_function(function);
        Ok(())
    }

    fn lower_global(&mut self, decl: DeclId) -> Result<(), Error> {
        let ast = self.ast;
        let global = ast.get_decl(decl);
        let position = global.span.start.clone();
        let Some(ty) = global.ty else {
            return Err(self.unresolved_decl(decl));
        };
        let ty = self.lower_type(ty, &position)?;

        let init = match global.init() {
            None => GlobalInit::Zero,
            Some(init) => match (evaluate_constant(ast, init), init.ignore_parens()) {
                (Some(value), _) if ty.is_floating() => GlobalInit::Float(value.as_float()),
                (Some(value), _) if ty.is_integer() => GlobalInit::Int(value.as_int()),
                (
                    _,
                    Expr {
                        kind: ExprKind::StringLiteral(text),
                        ..
                    },
                ) => GlobalInit::Bytes(nul_terminated(text)),
                _ => {
                    return Err(Error::not_implemented(
                        format!("non-constant initializer of global `{}`", global.name_str()),
                        position,
                    ))
                }
            },
        };

        let symbol = self.symbol(decl)?;
        self.module.add_global(Global {
            name: symbol,
            ty,
            init,
            constant: global.is_constant(),
        });
        Ok(())
    }

    fn unresolved_decl(&self, decl: DeclId) -> Error {
        let decl = self.ast.get_decl(decl);
        Error::new(
            ErrorImpl::UnresolvedType {
                type_: decl.name_str().to_string(),
            },
            decl.span.start.clone(),
        )
    }

    /// Adds a constant global holding `text` and a trailing NUL.
    pub fn add_string(&mut self, text: &str) -> Operand {
        let name = format!(".str.{}", self.string_count);
        self.string_count += 1;

        let bytes = nul_terminated(text);
        self.module.add_global(Global {
            name: name.clone(),
            ty: IrType::Array(Box::new(IrType::I8), bytes.len() as u64),
            init: GlobalInit::Bytes(bytes),
            constant: true,
        });
        Operand::global(name)
    }

    // Insertion point

    pub fn current_function(&self) -> Result<&Function, Error> {
        self.function
            .as_ref()
            .ok_or_else(|| Error::invariant("emitting code outside of a function"))
    }

    fn function_mut(&mut self) -> Result<&mut Function, Error> {
        self.function
            .as_mut()
            .ok_or_else(|| Error::invariant("emitting code outside of a function"))
    }

    pub fn append_block(&mut self, name: &str) -> Result<BlockId, Error> {
        Ok(self.function_mut()?.append_block(name))
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.insertion = Some(block);
    }

    /// The block code is emitted into, opening an unreachable one when the
    /// previous block was terminated.
    pub fn current_block(&mut self) -> Result<BlockId, Error> {
        if let Some(block) = self.insertion {
            return Ok(block);
        }
        let block = self.append_block("dead")?;
        self.insertion = Some(block);
        Ok(block)
    }

    /// Ends the current block with a branch to `target` unless it already
    /// has a terminator, then clears the insertion point.
    pub fn emit_branch(&mut self, target: BlockId) -> Result<(), Error> {
        if let Some(block) = self.insertion.take() {
            let block = self.function_mut()?.block_mut(block);
            if !block.is_terminated() {
                block.terminator = Some(Terminator::Br(target));
            }
        }
        Ok(())
    }

    /// Ends the current block with `terminator` and clears the insertion
    /// point.
    pub fn terminate(&mut self, terminator: Terminator) -> Result<(), Error> {
        let block = self.current_block()?;
        let block = self.function_mut()?.block_mut(block);
        if !block.is_terminated() {
            block.terminator = Some(terminator);
        }
        self.insertion = None;
        Ok(())
    }

    /// Appends an instruction producing a value of type `ty`.
    ///
    /// # Returns
    ///
    /// The result register, or a void operand when `ty` is void.
    pub fn emit(&mut self, ty: IrType, kind: InstKind) -> Result<Operand, Error> {
        let block = self.current_block()?;
        let function = self.function_mut()?;

        let result = match ty {
            IrType::Void => None,
            _ => Some(function.next_value()),
        };
        function.block_mut(block).instructions.push(Instruction {
            result,
            ty: ty.clone(),
            kind,
        });

        Ok(match result {
            Some(id) => Operand::register(ty, id),
            None => Operand::void(),
        })
    }

    pub fn emit_store(&mut self, value: Operand, ptr: Operand) -> Result<(), Error> {
        self.emit(IrType::Void, InstKind::Store { value, ptr })?;
        Ok(())
    }

    pub fn emit_load(&mut self, ty: IrType, ptr: Operand) -> Result<Operand, Error> {
        self.emit(ty, InstKind::Load(ptr))
    }

    /// Reserves a stack slot in the entry block, ahead of any other
    /// instruction there.
    pub fn emit_alloca(&mut self, ty: IrType) -> Result<Operand, Error> {
        let index = self.alloca_count;
        let function = self.function_mut()?;
        let id = function.next_value();
        function.block_mut(BlockId(0)).instructions.insert(
            index,
            Instruction {
                result: Some(id),
                ty: IrType::Ptr,
                kind: InstKind::Alloca(ty),
            },
        );
        self.alloca_count += 1;
        Ok(Operand::register(IrType::Ptr, id))
    }

    // Scopes

    pub fn local(&self, decl: DeclId) -> Option<Operand> {
        self.locals.get(&decl).cloned()
    }

    pub fn bind_local(&mut self, decl: DeclId, slot: Operand) {
        self.locals.insert(decl, slot);
    }

    /// The block a label stands for, created on first mention.
    pub fn label_block(&mut self, label: DeclId) -> Result<BlockId, Error> {
        if let Some(block) = self.labels.get(&label) {
            return Ok(*block);
        }
        let block = self.append_block(self.ast.get_decl(label).name_str())?;
        self.labels.insert(label, block);
        Ok(block)
    }

    pub fn push_loop(&mut self, targets: LoopTargets) {
        self.loops.push(targets);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn loop_targets(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }
}

pub fn class_type(class: BuiltinClass) -> IrType {
    match class {
        BuiltinClass::Void => IrType::Void,
        BuiltinClass::Bool => IrType::I1,
        BuiltinClass::Char | BuiltinClass::I8 | BuiltinClass::U8 => IrType::I8,
        BuiltinClass::I16 | BuiltinClass::U16 => IrType::I16,
        BuiltinClass::I32 | BuiltinClass::U32 => IrType::I32,
        BuiltinClass::I64 | BuiltinClass::U64 => IrType::I64,
        BuiltinClass::F32 => IrType::F32,
        BuiltinClass::F64 => IrType::F64,
    }
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

impl StmtVisitor for CodeGen<'_> {
    type Value = Operand;

    fn last_value(&mut self) -> &mut Option<Operand> {
        &mut self.last_value
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        Err(Error::not_implemented(
            format!("lowering {}", stmt.class()),
            stmt.span.start.clone(),
        ))
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        Err(Error::not_implemented(
            format!("lowering {}", expr.class()),
            expr.span.start.clone(),
        ))
    }

    fn visit_null_stmt(&mut self, _stmt: &Stmt) -> Result<(), Error> {
        Ok(())
    }

    fn visit_compound_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_compound_stmt(self, stmt)
    }

    fn visit_decl_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_decl_stmt(self, stmt)
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_if_stmt(self, stmt)
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_while_stmt(self, stmt)
    }

    fn visit_do_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_do_stmt(self, stmt)
    }

    fn visit_for_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_for_stmt(self, stmt)
    }

    fn visit_break_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_jump_stmt(self, stmt)
    }

    fn visit_continue_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_jump_stmt(self, stmt)
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_return_stmt(self, stmt)
    }

    fn visit_label_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_label_stmt(self, stmt)
    }

    fn visit_goto_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        stmt::gen_jump_stmt(self, stmt)
    }

    fn visit_integer_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_literal(self, expr)?);
        Ok(())
    }

    fn visit_floating_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_literal(self, expr)?);
        Ok(())
    }

    fn visit_bool_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_literal(self, expr)?);
        Ok(())
    }

    fn visit_char_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_literal(self, expr)?);
        Ok(())
    }

    fn visit_string_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_load_of(self, expr)?);
        Ok(())
    }

    fn visit_decl_ref_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_decl_ref(self, expr)?);
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
        self.last_value = Some(expr::gen_unary(self, expr)?);
        Ok(())
    }

    fn visit_binary_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_binary(self, expr)?);
        Ok(())
    }

    fn visit_compound_assign_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_compound_assign(self, expr)?);
        Ok(())
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_call(self, expr)?);
        Ok(())
    }

    fn visit_member_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_load_of(self, expr)?);
        Ok(())
    }

    fn visit_array_subscript_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_load_of(self, expr)?);
        Ok(())
    }

    fn visit_conditional_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_conditional(self, expr)?);
        Ok(())
    }

    fn visit_cast_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.last_value = Some(expr::gen_cast(self, expr)?);
        Ok(())
    }

    fn visit_recovery_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        Err(Error::invariant(format!(
            "recovery expression at offset {} reached code generation",
            expr.span.start.0
        )))
    }
}

/// Drives a compile: parse and analyse a file, lower it, verify the result
/// and write it out.
///
/// The runtime functions of [`super::stdlib`] are declared before any
/// source is analysed.
pub struct Compiler {
    pub sema: Sema,
    sources: Rc<RefCell<SourceManager>>,
}

impl Compiler {
    /// Creates a compiler whose diagnostics go to the `log` facade.
    ///
    /// # Arguments
    ///
    /// * `options` - Session options. `dump_ir` logs every lowered module.
    ///
    /// # Returns
    ///
    /// The compiler, or an error if the diagnostic text map could not be
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

        Compiler::with_sema(Sema::new(diags, options), sources)
    }

    pub fn with_sema(mut sema: Sema, sources: Rc<RefCell<SourceManager>>) -> Result<Self, Error> {
        declare_runtime(&mut sema)?;
        Ok(Compiler { sema, sources })
    }

    pub fn sources(&self) -> Rc<RefCell<SourceManager>> {
        Rc::clone(&self.sources)
    }

    /// Analyses `content` and lowers everything declared so far.
    ///
    /// # Arguments
    ///
    /// * `name` - File name, used for diagnostics and as the module name
    /// * `content` - Source text
    ///
    /// # Returns
    ///
    /// The verified module. Any error discards it.
    pub fn compile_source(&mut self, name: &str, content: &str) -> Result<Module, Error> {
        self.sources.borrow_mut().add_file(name, content);
        parse_source(&mut self.sema, name, content)?;

        let module = CodeGen::new(&self.sema.ast, name).compile()?;
        verify_module(&module)?;

        if self.sema.options.dump_ir {
            info!("codegen: module `{}`\n{}", name, module);
        }
        Ok(module)
    }

    /// Compiles the file at `path` and writes the result.
    ///
    /// # Arguments
    ///
    /// * `path` - Source file
    /// * `output` - Output file; defaults to `path` with an `.ir` (or
    ///   `.ll`) extension
    /// * `emit_llvm` - Translate the module to LLVM IR; needs the `llvm`
    ///   feature
    ///
    /// # Returns
    ///
    /// The path written to.
    pub fn compile_file(&mut self, path: &Path, output: Option<&Path>, emit_llvm: bool) -> Result<PathBuf, Error> {
        let (name, content) = self.sources.borrow_mut().load_file(path)?;
        let module = self.compile_source(&name, &content)?;

        let extension = if emit_llvm { "ll" } else { "ir" };
        let output = output.map_or_else(|| path.with_extension(extension), Path::to_path_buf);

        if emit_llvm {
            write_llvm(&module, &output)?;
        } else {
            std::fs::write(&output, module.to_string()).map_err(|error| {
                Error::new(
                    ErrorImpl::IoError {
                        message: format!("{}: {}", output.display(), error),
                    },
                    Position::null(),
                )
            })?;
        }

        info!("compiler: wrote {}", output.display());
        Ok(output)
    }
}

#[cfg(feature = "llvm")]
fn write_llvm(module: &Module, output: &Path) -> Result<(), Error> {
    super::llvm::write_module(module, output)
}

#[cfg(not(feature = "llvm"))]
fn write_llvm(_module: &Module, _output: &Path) -> Result<(), Error> {
    Err(Error::not_implemented(
        "LLVM output (rebuild with the `llvm` feature)",
        Position::null(),
    ))
}
