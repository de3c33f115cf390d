//! Translation of a verified IR module into LLVM IR through inkwell.
//!
//! Only built with the `llvm` feature. The IR was shaped after LLVM, so the
//! translation is one instruction at a time; pointer types are recovered
//! from the allocas, globals and element pointers that produce them.

use std::{collections::HashMap, path::Path};

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::{Linkage, Module},
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum},
    values::{BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, PhiValue},
    AddressSpace, FloatPredicate, IntPredicate,
};
use log::debug;

use crate::{
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::ir::{
    self, BinaryOp, BlockId, CastOp, GlobalInit, InstKind, IrType, Operand, OperandKind, Terminator, ValueId,
};

fn backend_error(function: &str, message: impl ToString) -> Error {
    Error::new(
        ErrorImpl::VerificationFailed {
            function: function.to_string(),
            message: message.to_string(),
        },
        Position::null(),
    )
}

/// Translates `module` and writes it as textual LLVM IR to `output`.
///
/// # Arguments
///
/// * `module` - A module that passed [`super::verifier::verify_module`]
/// * `output` - Path of the `.ll` file to write
pub fn write_module(module: &ir::Module, output: &Path) -> Result<(), Error> {
    let context = Context::create();
    let translated = translate_module(&context, module)?;

    translated
        .verify()
        .map_err(|message| backend_error(&module.name, message.to_string()))?;
    translated.print_to_file(output).map_err(|message| {
        Error::new(
            ErrorImpl::IoError {
                message: message.to_string(),
            },
            Position::null(),
        )
    })
}

/// Builds the LLVM module for `module` inside `context`.
pub fn translate_module<'ctx>(context: &'ctx Context, module: &ir::Module) -> Result<Module<'ctx>, Error> {
    let translator = Translator {
        context,
        module: context.create_module(&module.name),
        builder: context.create_builder(),
    };

    for global in &module.globals {
        translator.add_global(global)?;
    }
    for function in &module.functions {
        translator.declare_function(function)?;
    }
    for function in module.functions.iter().filter(|function| !function.is_declaration()) {
        translator.define_function(function)?;
    }

    debug!("llvm: translated module `{}`", module.name);
    Ok(translator.module)
}

struct Translator<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
}

impl<'ctx> Translator<'ctx> {
    fn basic_type(&self, ty: &IrType) -> Option<BasicTypeEnum<'ctx>> {
        let ty: BasicTypeEnum = match ty {
            IrType::Void => return None,
            IrType::I1 => self.context.bool_type().into(),
            IrType::I8 => self.context.i8_type().into(),
            IrType::I16 => self.context.i16_type().into(),
            IrType::I32 => self.context.i32_type().into(),
            IrType::I64 => self.context.i64_type().into(),
            IrType::F32 => self.context.f32_type().into(),
            IrType::F64 => self.context.f64_type().into(),
            IrType::Ptr => self.context.i8_type().ptr_type(AddressSpace::default()).into(),
            IrType::Array(element, count) => self.basic_type(element)?.array_type(*count as u32).into(),
            IrType::Struct(fields) => {
                let fields: Option<Vec<BasicTypeEnum>> = fields.iter().map(|field| self.basic_type(field)).collect();
                self.context.struct_type(&fields?, false).into()
            }
        };
        Some(ty)
    }

    fn value_type(&self, function: &str, ty: &IrType) -> Result<BasicTypeEnum<'ctx>, Error> {
        self.basic_type(ty)
            .ok_or_else(|| backend_error(function, format!("{} has no value representation", ty)))
    }

    fn zero_value(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(ty) => ty.const_zero().into(),
            BasicTypeEnum::FloatType(ty) => ty.const_zero().into(),
            BasicTypeEnum::ArrayType(ty) => ty.const_zero().into(),
            BasicTypeEnum::StructType(ty) => ty.const_zero().into(),
            BasicTypeEnum::PointerType(ty) => ty.const_null().into(),
            BasicTypeEnum::VectorType(ty) => ty.const_zero().into(),
        }
    }

    fn add_global(&self, global: &ir::Global) -> Result<(), Error> {
        let ty = self.value_type(&global.name, &global.ty)?;
        let value = self.module.add_global(ty, Some(AddressSpace::default()), &global.name);

        let init: BasicValueEnum = match (&global.init, ty) {
            (GlobalInit::Int(value), BasicTypeEnum::IntType(ty)) => ty.const_int(*value as u64, true).into(),
            (GlobalInit::Float(value), BasicTypeEnum::FloatType(ty)) => ty.const_float(*value).into(),
            (GlobalInit::Bytes(bytes), _) => self.context.const_string(bytes, false).into(),
            _ => self.zero_value(ty),
        };
        value.set_initializer(&init);
        value.set_constant(global.constant);
        if global.constant {
            value.set_linkage(Linkage::Private);
        }
        Ok(())
    }

    fn declare_function(&self, function: &ir::Function) -> Result<FunctionValue<'ctx>, Error> {
        let params = function
            .params
            .iter()
            .map(|param| self.value_type(&function.name, param).map(BasicMetadataTypeEnum::from))
            .collect::<Result<Vec<_>, Error>>()?;

        let fn_type = match self.basic_type(&function.result) {
            Some(result) => result.fn_type(&params, function.variadic),
            None => self.context.void_type().fn_type(&params, function.variadic),
        };
        Ok(self
            .module
            .add_function(&function.name, fn_type, Some(Linkage::External)))
    }

    fn define_function(&self, function: &ir::Function) -> Result<(), Error> {
        let name = function.name.as_str();
        let value = self
            .module
            .get_function(name)
            .ok_or_else(|| backend_error(name, "function was not declared"))?;

        let blocks: Vec<BasicBlock> = function
            .blocks
            .iter()
            .map(|block| self.context.append_basic_block(value, &block.name))
            .collect();

        let mut state = FunctionState {
            name,
            values: HashMap::new(),
            pending_phis: vec![],
        };
        for index in 0..function.params.len() {
            let param = value
                .get_nth_param(index as u32)
                .ok_or_else(|| backend_error(name, format!("missing parameter {}", index)))?;
            state.values.insert(ValueId(index as u32), param);
        }

        for block in reverse_postorder(function) {
            self.builder.position_at_end(blocks[block.0]);
            for instruction in &function.block(block).instructions {
                self.translate_instruction(&mut state, instruction)?;
            }
            if let Some(terminator) = &function.block(block).terminator {
                self.translate_terminator(&state, &blocks, terminator)?;
            }
        }

        // Incoming values may be defined in blocks translated after the phi
        for (phi, incoming) in state.pending_phis {
            for (operand, from) in incoming {
                let value = self.operand(&state, &operand)?;
                phi.add_incoming(&[(&value as &dyn BasicValue, blocks[from.0])]);
            }
        }
        Ok(())
    }

    fn operand(&self, state: &FunctionState<'_, 'ctx>, operand: &Operand) -> Result<BasicValueEnum<'ctx>, Error> {
        let value = match &operand.kind {
            OperandKind::Register(id) => {
                return state
                    .values
                    .get(id)
                    .copied()
                    .ok_or_else(|| backend_error(state.name, format!("%{} used before its definition", id.0)))
            }
            OperandKind::Int(value) => match self.value_type(state.name, &operand.ty)? {
                BasicTypeEnum::IntType(ty) => ty.const_int(*value as u64, true).into(),
                _ => return Err(backend_error(state.name, format!("integer constant of type {}", operand.ty))),
            },
            OperandKind::Float(value) => match self.value_type(state.name, &operand.ty)? {
                BasicTypeEnum::FloatType(ty) => ty.const_float(*value).into(),
                _ => return Err(backend_error(state.name, format!("float constant of type {}", operand.ty))),
            },
            OperandKind::Global(name) => self
                .module
                .get_global(name)
                .ok_or_else(|| backend_error(state.name, format!("unknown global @{}", name)))?
                .as_pointer_value()
                .into(),
            OperandKind::Zero => self.zero_value(self.value_type(state.name, &operand.ty)?),
            OperandKind::Void => return Err(backend_error(state.name, "void value used as an operand")),
        };
        Ok(value)
    }

    fn translate_instruction(&self, state: &mut FunctionState<'_, 'ctx>, instruction: &ir::Instruction) -> Result<(), Error> {
        let name = state.name;
        let fail = |error: inkwell::builder::BuilderError| backend_error(name, error.to_string());

        let value: Option<BasicValueEnum> = match &instruction.kind {
            InstKind::Alloca(ty) => {
                let ty = self.value_type(name, ty)?;
                Some(self.builder.build_alloca(ty, "").map_err(fail)?.into())
            }
            InstKind::Load(ptr) => {
                let ptr = self.operand(state, ptr)?.into_pointer_value();
                Some(self.builder.build_load(ptr, "").map_err(fail)?)
            }
            InstKind::Store { value, ptr } => {
                let value = self.operand(state, value)?;
                let ptr = self.operand(state, ptr)?.into_pointer_value();
                self.builder.build_store(ptr, value).map_err(fail)?;
                None
            }
            InstKind::Binary { op, lhs, rhs } => {
                let lhs = self.operand(state, lhs)?;
                let rhs = self.operand(state, rhs)?;
                Some(self.build_binary(*op, lhs, rhs).map_err(fail)?)
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let lhs = self.operand(state, lhs)?.into_int_value();
                let rhs = self.operand(state, rhs)?.into_int_value();
                Some(
                    self.builder
                        .build_int_compare(int_predicate(*pred), lhs, rhs, "")
                        .map_err(fail)?
                        .into(),
                )
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                let lhs = self.operand(state, lhs)?.into_float_value();
                let rhs = self.operand(state, rhs)?.into_float_value();
                Some(
                    self.builder
                        .build_float_compare(float_predicate(*pred), lhs, rhs, "")
                        .map_err(fail)?
                        .into(),
                )
            }
            InstKind::Cast { op, value } => {
                let value = self.operand(state, value)?;
                let target = self.value_type(name, &instruction.ty)?;
                Some(self.build_cast(*op, value, target).map_err(fail)?)
            }
            InstKind::ElementPtr { ptr, indices, .. } => {
                let ptr = self.operand(state, ptr)?.into_pointer_value();
                let indices = indices
                    .iter()
                    .map(|index| self.operand(state, index).map(|index| index.into_int_value()))
                    .collect::<Result<Vec<_>, Error>>()?;
                // SAFETY: indices were produced from the aggregate's own
                // layout and array subscripts are checked by Sema's types
                let element = unsafe { self.builder.build_gep(ptr, &indices, "") }.map_err(fail)?;
                Some(element.into())
            }
            InstKind::Call { callee, args } => {
                let function = self
                    .module
                    .get_function(callee)
                    .ok_or_else(|| backend_error(name, format!("unknown function @{}", callee)))?;
                let args = args
                    .iter()
                    .map(|arg| self.operand(state, arg).map(BasicMetadataValueEnum::from))
                    .collect::<Result<Vec<_>, Error>>()?;
                let call = self.builder.build_call(function, &args, "").map_err(fail)?;
                call.try_as_basic_value().left()
            }
            InstKind::Phi(incoming) => {
                let ty = self.value_type(name, &instruction.ty)?;
                let phi = self.builder.build_phi(ty, "").map_err(fail)?;
                state.pending_phis.push((phi, incoming.clone()));
                Some(phi.as_basic_value())
            }
        };

        if let (Some(result), Some(value)) = (instruction.result, value) {
            state.values.insert(result, value);
        }
        Ok(())
    }

    fn build_binary(
        &self,
        op: BinaryOp,
        lhs: BasicValueEnum<'ctx>,
        rhs: BasicValueEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, inkwell::builder::BuilderError> {
        if op.is_floating() {
            let (lhs, rhs) = (lhs.into_float_value(), rhs.into_float_value());
            let value = match op {
                BinaryOp::FAdd => self.builder.build_float_add(lhs, rhs, "")?,
                BinaryOp::FSub => self.builder.build_float_sub(lhs, rhs, "")?,
                BinaryOp::FMul => self.builder.build_float_mul(lhs, rhs, "")?,
                _ => self.builder.build_float_div(lhs, rhs, "")?,
            };
            return Ok(value.into());
        }

        let (lhs, rhs) = (lhs.into_int_value(), rhs.into_int_value());
        let value = match op {
            BinaryOp::Add => self.builder.build_int_add(lhs, rhs, "")?,
            BinaryOp::Sub => self.builder.build_int_sub(lhs, rhs, "")?,
            BinaryOp::Mul => self.builder.build_int_mul(lhs, rhs, "")?,
            BinaryOp::SDiv => self.builder.build_int_signed_div(lhs, rhs, "")?,
            BinaryOp::UDiv => self.builder.build_int_unsigned_div(lhs, rhs, "")?,
            BinaryOp::SRem => self.builder.build_int_signed_rem(lhs, rhs, "")?,
            BinaryOp::URem => self.builder.build_int_unsigned_rem(lhs, rhs, "")?,
            BinaryOp::Shl => self.builder.build_left_shift(lhs, rhs, "")?,
            BinaryOp::LShr => self.builder.build_right_shift(lhs, rhs, false, "")?,
            BinaryOp::AShr => self.builder.build_right_shift(lhs, rhs, true, "")?,
            BinaryOp::And => self.builder.build_and(lhs, rhs, "")?,
            BinaryOp::Or => self.builder.build_or(lhs, rhs, "")?,
            _ => self.builder.build_xor(lhs, rhs, "")?,
        };
        Ok(value.into())
    }

    fn build_cast(
        &self,
        op: CastOp,
        value: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, inkwell::builder::BuilderError> {
        let value: BasicValueEnum = match op {
            CastOp::Trunc => self
                .builder
                .build_int_truncate(value.into_int_value(), target.into_int_type(), "")?
                .into(),
            CastOp::ZExt => self
                .builder
                .build_int_z_extend(value.into_int_value(), target.into_int_type(), "")?
                .into(),
            CastOp::SExt => self
                .builder
                .build_int_s_extend(value.into_int_value(), target.into_int_type(), "")?
                .into(),
            CastOp::FPTrunc => self
                .builder
                .build_float_trunc(value.into_float_value(), target.into_float_type(), "")?
                .into(),
            CastOp::FPExt => self
                .builder
                .build_float_ext(value.into_float_value(), target.into_float_type(), "")?
                .into(),
            CastOp::SIToFP => self
                .builder
                .build_signed_int_to_float(value.into_int_value(), target.into_float_type(), "")?
                .into(),
            CastOp::UIToFP => self
                .builder
                .build_unsigned_int_to_float(value.into_int_value(), target.into_float_type(), "")?
                .into(),
            CastOp::FPToSI => self
                .builder
                .build_float_to_signed_int(value.into_float_value(), target.into_int_type(), "")?
                .into(),
            CastOp::FPToUI => self
                .builder
                .build_float_to_unsigned_int(value.into_float_value(), target.into_int_type(), "")?
                .into(),
        };
        Ok(value)
    }

    fn translate_terminator(
        &self,
        state: &FunctionState<'_, 'ctx>,
        blocks: &[BasicBlock<'ctx>],
        terminator: &Terminator,
    ) -> Result<(), Error> {
        let fail = |error: inkwell::builder::BuilderError| backend_error(state.name, error.to_string());
        match terminator {
            Terminator::Ret(None) => self.builder.build_return(None).map_err(fail)?,
            Terminator::Ret(Some(value)) => {
                let value = self.operand(state, value)?;
                self.builder.build_return(Some(&value)).map_err(fail)?
            }
            Terminator::Br(target) => self
                .builder
                .build_unconditional_branch(blocks[target.0])
                .map_err(fail)?,
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.operand(state, cond)?.into_int_value();
                self.builder
                    .build_conditional_branch(cond, blocks[then_block.0], blocks[else_block.0])
                    .map_err(fail)?
            }
            Terminator::Unreachable => self.builder.build_unreachable().map_err(fail)?,
        };
        Ok(())
    }
}

struct FunctionState<'f, 'ctx> {
    name: &'f str,
    values: HashMap<ValueId, BasicValueEnum<'ctx>>,
    pending_phis: Vec<(PhiValue<'ctx>, Vec<(Operand, BlockId)>)>,
}

/// Blocks in reverse postorder from the entry, so every definition is
/// translated before the instructions it dominates.
fn reverse_postorder(function: &ir::Function) -> Vec<BlockId> {
    let mut visited = vec![false; function.blocks.len()];
    let mut order = vec![];
    let mut stack = vec![(BlockId(0), false)];

    while let Some((block, finished)) = stack.pop() {
        if finished {
            order.push(block);
            continue;
        }
        if visited[block.0] {
            continue;
        }
        visited[block.0] = true;
        stack.push((block, true));
        if let Some(terminator) = &function.block(block).terminator {
            for successor in terminator.successors().into_iter().rev() {
                if !visited[successor.0] {
                    stack.push((successor, false));
                }
            }
        }
    }

    order.reverse();
    order
}

fn int_predicate(pred: ir::IntPredicate) -> IntPredicate {
    match pred {
        ir::IntPredicate::Eq => IntPredicate::EQ,
        ir::IntPredicate::Ne => IntPredicate::NE,
        ir::IntPredicate::Slt => IntPredicate::SLT,
        ir::IntPredicate::Sgt => IntPredicate::SGT,
        ir::IntPredicate::Sle => IntPredicate::SLE,
        ir::IntPredicate::Sge => IntPredicate::SGE,
        ir::IntPredicate::Ult => IntPredicate::ULT,
        ir::IntPredicate::Ugt => IntPredicate::UGT,
        ir::IntPredicate::Ule => IntPredicate::ULE,
        ir::IntPredicate::Uge => IntPredicate::UGE,
    }
}

fn float_predicate(pred: ir::FloatPredicate) -> FloatPredicate {
    match pred {
        ir::FloatPredicate::Oeq => FloatPredicate::OEQ,
        ir::FloatPredicate::One => FloatPredicate::ONE,
        ir::FloatPredicate::Olt => FloatPredicate::OLT,
        ir::FloatPredicate::Ogt => FloatPredicate::OGT,
        ir::FloatPredicate::Ole => FloatPredicate::OLE,
        ir::FloatPredicate::Oge => FloatPredicate::OGE,
    }
}
