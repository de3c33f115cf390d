use crate::{
    ast::{
        decls::DeclKind,
        stmts::{BinaryOperator, Expr, ExprKind, UnaryOperator},
        types::BuiltinClass,
        visitor::StmtVisitor,
    },
    errors::errors::{Error, ErrorImpl},
    sema::constant::wrap_integer,
    Position,
};

use super::{
    compiler::{class_type, CodeGen},
    ir::{BinaryOp, CastOp, FloatPredicate, InstKind, IntPredicate, IrType, Operand, OperandKind, Terminator},
};

fn invalid_opcode(opcode: &str, position: &Position) -> Error {
    Error::new(
        ErrorImpl::InvalidOpcode {
            opcode: opcode.to_string(),
        },
        position.clone(),
    )
}

pub fn gen_literal(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let position = &expr.span.start;
    let value = match &expr.kind {
        ExprKind::IntegerLiteral(value) => Operand::int(codegen.lower_type(expr.ty, position)?, *value),
        ExprKind::FloatingLiteral(value) => match codegen.lower_type(expr.ty, position)? {
            IrType::F32 => Operand::float(IrType::F32, *value as f32 as f64),
            ty => Operand::float(ty, *value),
        },
        ExprKind::BoolLiteral(value) => Operand::bool(*value),
        ExprKind::CharLiteral(value) => Operand::int(IrType::I8, *value as i64),
        _ => return Err(Error::invariant(format!("{} is not a literal", expr.class()))),
    };
    Ok(value)
}

/// The address of the storage `expr` designates.
///
/// Variables resolve to their stack slot or global, members and elements
/// to an element pointer into their base, and string literals to their
/// constant global. Any other expression is evaluated into a fresh stack
/// slot first.
pub fn gen_address(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let position = &expr.span.start;
    match &expr.kind {
        ExprKind::DeclRef(decl) => {
            if let Some(slot) = codegen.local(*decl) {
                return Ok(slot);
            }
            let kind = codegen.ast.get_decl(*decl).kind;
            match kind {
                DeclKind::Var => Ok(Operand::global(codegen.symbol(*decl)?)),
                _ => Err(Error::new(
                    ErrorImpl::DanglingDeclRef {
                        name: codegen.ast.get_decl(*decl).name_str().to_string(),
                    },
                    position.clone(),
                )),
            }
        }
        ExprKind::Paren(inner) => gen_address(codegen, inner),
        ExprKind::StringLiteral(text) => Ok(codegen.add_string(text)),
        ExprKind::Member { base, index, .. } => {
            let aggregate = codegen.lower_type(base.ty, position)?;
            let ptr = gen_address(codegen, base)?;
            codegen.emit(
                IrType::Ptr,
                InstKind::ElementPtr {
                    aggregate,
                    ptr,
                    indices: vec![Operand::int(IrType::I32, 0), Operand::int(IrType::I32, *index as i64)],
                },
            )
        }
        ExprKind::ArraySubscript { base, index } => {
            let aggregate = codegen.lower_type(base.ty, position)?;
            let ptr = gen_address(codegen, base)?;
            let index = codegen.evaluate(index)?;
            codegen.emit(
                IrType::Ptr,
                InstKind::ElementPtr {
                    aggregate,
                    ptr,
                    indices: vec![Operand::int(IrType::I64, 0), index],
                },
            )
        }
        _ => {
            let ty = codegen.lower_type(expr.ty, position)?;
            let value = codegen.evaluate(expr)?;
            let slot = codegen.emit_alloca(ty)?;
            codegen.emit_store(value, slot.clone())?;
            Ok(slot)
        }
    }
}

/// Loads the value stored at the address of `expr`.
pub fn gen_load_of(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ty = codegen.lower_type(expr.ty, &expr.span.start)?;
    let ptr = gen_address(codegen, expr)?;
    codegen.emit_load(ty, ptr)
}

pub fn gen_decl_ref(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::DeclRef(decl) = &expr.kind else {
        return Err(Error::invariant("malformed declaration reference"));
    };

    let ast = codegen.ast;
    let referenced = ast.get_decl(*decl);
    match referenced.kind {
        DeclKind::EnumConstant => {
            let ty = codegen.lower_type(expr.ty, &expr.span.start)?;
            Ok(Operand::int(ty, referenced.enum_value().unwrap_or(0)))
        }
        DeclKind::Var | DeclKind::ParmVar => gen_load_of(codegen, expr),
        _ => Err(Error::not_implemented(
            format!("`{}` used as a value", referenced.name_str()),
            expr.span.start.clone(),
        )),
    }
}

/// Evaluates a condition as an `i1`.
pub fn gen_condition(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let value = codegen.evaluate(expr)?;
    if value.ty == IrType::I1 {
        return Ok(value);
    }

    let zero = Operand::zero(value.ty.clone());
    let kind = if value.ty.is_floating() {
        InstKind::FCmp {
            pred: FloatPredicate::One,
            lhs: value,
            rhs: zero,
        }
    } else if value.ty.is_integer() {
        InstKind::ICmp {
            pred: IntPredicate::Ne,
            lhs: value,
            rhs: zero,
        }
    } else {
        return Err(Error::invariant(format!("{} used as a condition", value.ty)));
    };
    codegen.emit(IrType::I1, kind)
}

/// Converts a scalar between builtin classes with the matching cast
/// instruction. Integer constants are folded.
pub fn convert(codegen: &mut CodeGen, value: Operand, from: BuiltinClass, to: BuiltinClass) -> Result<Operand, Error> {
    if from == to {
        return Ok(value);
    }
    let target = class_type(to);

    if to == BuiltinClass::Bool {
        let zero = Operand::zero(value.ty.clone());
        let kind = if from.is_floating() {
            InstKind::FCmp {
                pred: FloatPredicate::One,
                lhs: value,
                rhs: zero,
            }
        } else {
            InstKind::ICmp {
                pred: IntPredicate::Ne,
                lhs: value,
                rhs: zero,
            }
        };
        return codegen.emit(IrType::I1, kind);
    }

    if let OperandKind::Int(constant) = value.kind {
        if to.is_floating() {
            let constant = if from.is_signed() {
                constant as f64
            } else {
                constant as u64 as f64
            };
            return Ok(Operand::float(target, constant));
        }
        return Ok(Operand::int(target, wrap_integer(constant, to)));
    }

    let op = match (from.is_floating(), to.is_floating()) {
        (true, true) if to.bit_width() > from.bit_width() => CastOp::FPExt,
        (true, true) => CastOp::FPTrunc,
        (true, false) if to.is_signed() => CastOp::FPToSI,
        (true, false) => CastOp::FPToUI,
        (false, true) if from.is_signed() => CastOp::SIToFP,
        (false, true) => CastOp::UIToFP,
        (false, false) => {
            if to.bit_width() == from.bit_width() {
                return Ok(Operand { ty: target, ..value });
            }
            if to.bit_width() < from.bit_width() {
                CastOp::Trunc
            } else if from.is_signed() {
                CastOp::SExt
            } else {
                CastOp::ZExt
            }
        }
    };
    codegen.emit(target, InstKind::Cast { op, value })
}

pub fn gen_cast(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let Some(cast) = expr.as_cast() else {
        return Err(Error::invariant("malformed cast"));
    };
    let value = codegen.evaluate(&cast.operand)?;
    match (
        codegen.ast.arithmetic_class(cast.operand.ty),
        codegen.ast.arithmetic_class(expr.ty),
    ) {
        (Some(from), Some(to)) => convert(codegen, value, from, to),
        _ => Ok(value),
    }
}

fn arith_opcode(op: BinaryOperator, class: BuiltinClass) -> Option<BinaryOp> {
    if class.is_floating() {
        return match op {
            BinaryOperator::Add => Some(BinaryOp::FAdd),
            BinaryOperator::Sub => Some(BinaryOp::FSub),
            BinaryOperator::Mul => Some(BinaryOp::FMul),
            BinaryOperator::Div => Some(BinaryOp::FDiv),
            _ => None,
        };
    }

    let signed = class.is_signed();
    let opcode = match op {
        BinaryOperator::Add => BinaryOp::Add,
        BinaryOperator::Sub => BinaryOp::Sub,
        BinaryOperator::Mul => BinaryOp::Mul,
        BinaryOperator::Div if signed => BinaryOp::SDiv,
        BinaryOperator::Div => BinaryOp::UDiv,
        BinaryOperator::Rem if signed => BinaryOp::SRem,
        BinaryOperator::Rem => BinaryOp::URem,
        BinaryOperator::Shl => BinaryOp::Shl,
        BinaryOperator::Shr if signed => BinaryOp::AShr,
        BinaryOperator::Shr => BinaryOp::LShr,
        BinaryOperator::BitAnd => BinaryOp::And,
        BinaryOperator::BitXor => BinaryOp::Xor,
        BinaryOperator::BitOr => BinaryOp::Or,
        _ => return None,
    };
    Some(opcode)
}

/// `lhs op rhs` on operands already converted to `class`. Shift amounts
/// are taken modulo the bit width.
fn gen_arith(
    codegen: &mut CodeGen,
    op: BinaryOperator,
    class: BuiltinClass,
    lhs: Operand,
    rhs: Operand,
    position: &Position,
) -> Result<Operand, Error> {
    let opcode = arith_opcode(op, class).ok_or_else(|| invalid_opcode(op.spelling(), position))?;
    let ty = class_type(class);

    let mask = class.bit_width() as i64 - 1;
    let rhs = match rhs.kind {
        OperandKind::Int(amount) if op.is_shift() => Operand::int(ty.clone(), amount & mask),
        _ if op.is_shift() => codegen.emit(
            ty.clone(),
            InstKind::Binary {
                op: BinaryOp::And,
                lhs: rhs,
                rhs: Operand::int(ty.clone(), mask),
            },
        )?,
        _ => rhs,
    };
    codegen.emit(ty, InstKind::Binary { op: opcode, lhs, rhs })
}

fn gen_comparison(
    codegen: &mut CodeGen,
    op: BinaryOperator,
    class: BuiltinClass,
    lhs: Operand,
    rhs: Operand,
    position: &Position,
) -> Result<Operand, Error> {
    if class.is_floating() {
        let pred = match op {
            BinaryOperator::Eq => FloatPredicate::Oeq,
            BinaryOperator::Ne => FloatPredicate::One,
            BinaryOperator::Lt => FloatPredicate::Olt,
            BinaryOperator::Gt => FloatPredicate::Ogt,
            BinaryOperator::Le => FloatPredicate::Ole,
            BinaryOperator::Ge => FloatPredicate::Oge,
            _ => return Err(invalid_opcode(op.spelling(), position)),
        };
        return codegen.emit(IrType::I1, InstKind::FCmp { pred, lhs, rhs });
    }

    let signed = class.is_signed();
    let pred = match op {
        BinaryOperator::Eq => IntPredicate::Eq,
        BinaryOperator::Ne => IntPredicate::Ne,
        BinaryOperator::Lt if signed => IntPredicate::Slt,
        BinaryOperator::Lt => IntPredicate::Ult,
        BinaryOperator::Gt if signed => IntPredicate::Sgt,
        BinaryOperator::Gt => IntPredicate::Ugt,
        BinaryOperator::Le if signed => IntPredicate::Sle,
        BinaryOperator::Le => IntPredicate::Ule,
        BinaryOperator::Ge if signed => IntPredicate::Sge,
        BinaryOperator::Ge => IntPredicate::Uge,
        _ => return Err(invalid_opcode(op.spelling(), position)),
    };
    codegen.emit(IrType::I1, InstKind::ICmp { pred, lhs, rhs })
}

/// `&&` and `||` evaluate their right operand in a block of its own and
/// join both outcomes with a phi.
fn gen_logical(codegen: &mut CodeGen, op: BinaryOperator, lhs: &Expr, rhs: &Expr) -> Result<Operand, Error> {
    let is_and = op == BinaryOperator::LAnd;
    let (rhs_name, end_name) = if is_and {
        ("land.rhs", "land.end")
    } else {
        ("lor.rhs", "lor.end")
    };

    let left = gen_condition(codegen, lhs)?;
    let left_block = codegen.current_block()?;
    let rhs_block = codegen.append_block(rhs_name)?;
    let end_block = codegen.append_block(end_name)?;

    let (then_block, else_block) = if is_and {
        (rhs_block, end_block)
    } else {
        (end_block, rhs_block)
    };
    codegen.terminate(Terminator::CondBr {
        cond: left,
        then_block,
        else_block,
    })?;

    codegen.position_at_end(rhs_block);
    let right = gen_condition(codegen, rhs)?;
    let right_block = codegen.current_block()?;
    codegen.emit_branch(end_block)?;

    codegen.position_at_end(end_block);
    codegen.emit(
        IrType::I1,
        InstKind::Phi(vec![(Operand::bool(!is_and), left_block), (right, right_block)]),
    )
}

pub fn gen_binary(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::Binary(binary) = &expr.kind else {
        return Err(Error::invariant("malformed binary operator"));
    };
    let position = &expr.span.start;

    match binary.op {
        BinaryOperator::Assign => {
            let value = codegen.evaluate(&binary.rhs)?;
            let ptr = gen_address(codegen, &binary.lhs)?;
            codegen.emit_store(value.clone(), ptr)?;
            Ok(value)
        }
        op if op.is_logical() => gen_logical(codegen, op, &binary.lhs, &binary.rhs),
        op => {
            let lhs = codegen.evaluate(&binary.lhs)?;
            let rhs = codegen.evaluate(&binary.rhs)?;
            let class = codegen.class_of(binary.lhs.ty, position)?;
            if op.is_comparison() {
                gen_comparison(codegen, op, class, lhs, rhs, position)
            } else {
                gen_arith(codegen, op, class, lhs, rhs, position)
            }
        }
    }
}

/// Loads `lhs`, computes in the computation type and stores the result
/// converted back to the type of `lhs`.
pub fn gen_compound_assign(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::CompoundAssign(assign) = &expr.kind else {
        return Err(Error::invariant("malformed compound assignment"));
    };
    let position = &expr.span.start;
    let op = assign
        .op
        .compound_base()
        .ok_or_else(|| invalid_opcode(assign.op.spelling(), position))?;

    let rhs = codegen.evaluate(&assign.rhs)?;
    let ptr = gen_address(codegen, &assign.lhs)?;

    let lhs_class = codegen.class_of(assign.lhs.ty, position)?;
    let computation = codegen.class_of(assign.computation_type, position)?;

    let current = codegen.emit_load(class_type(lhs_class), ptr.clone())?;
    let current = convert(codegen, current, lhs_class, computation)?;
    let result = gen_arith(codegen, op, computation, current, rhs, position)?;
    let result = convert(codegen, result, computation, lhs_class)?;

    codegen.emit_store(result.clone(), ptr)?;
    Ok(result)
}

pub fn gen_unary(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::Unary { op, operand } = &expr.kind else {
        return Err(Error::invariant("malformed unary operator"));
    };
    let position = &expr.span.start;

    if op.is_increment_decrement() {
        return gen_increment(codegen, *op, operand, position);
    }

    match op {
        UnaryOperator::Plus => codegen.evaluate(operand),
        UnaryOperator::Not => {
            let value = gen_condition(codegen, operand)?;
            codegen.emit(
                IrType::I1,
                InstKind::Binary {
                    op: BinaryOp::Xor,
                    lhs: value,
                    rhs: Operand::bool(true),
                },
            )
        }
        UnaryOperator::Minus => {
            let class = codegen.class_of(expr.ty, position)?;
            let ty = class_type(class);
            let value = codegen.evaluate(operand)?;
            let op = if class.is_floating() {
                BinaryOp::FSub
            } else {
                BinaryOp::Sub
            };
            codegen.emit(
                ty.clone(),
                InstKind::Binary {
                    op,
                    lhs: Operand::zero(ty),
                    rhs: value,
                },
            )
        }
        UnaryOperator::BitNot => {
            let ty = class_type(codegen.class_of(expr.ty, position)?);
            let value = codegen.evaluate(operand)?;
            codegen.emit(
                ty.clone(),
                InstKind::Binary {
                    op: BinaryOp::Xor,
                    lhs: value,
                    rhs: Operand::int(ty, -1),
                },
            )
        }
        _ => Err(invalid_opcode(op.spelling(), position)),
    }
}

fn gen_increment(codegen: &mut CodeGen, op: UnaryOperator, operand: &Expr, position: &Position) -> Result<Operand, Error> {
    let class = codegen.class_of(operand.ty, position)?;
    let ty = class_type(class);
    let ptr = gen_address(codegen, operand)?;
    let old = codegen.emit_load(ty.clone(), ptr.clone())?;

    let delta = match op {
        UnaryOperator::PreInc | UnaryOperator::PostInc => 1,
        _ => -1,
    };
    let (opcode, step) = if class.is_floating() {
        (BinaryOp::FAdd, Operand::float(ty.clone(), delta as f64))
    } else {
        (BinaryOp::Add, Operand::int(ty.clone(), delta))
    };
    let new = codegen.emit(
        ty,
        InstKind::Binary {
            op: opcode,
            lhs: old.clone(),
            rhs: step,
        },
    )?;
    codegen.emit_store(new.clone(), ptr)?;

    Ok(if op.is_postfix() { old } else { new })
}

/// Checks the argument count against the callee's signature before
/// emitting the call.
pub fn gen_call(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::Call { callee, args } = &expr.kind else {
        return Err(Error::invariant("malformed call"));
    };
    let position = &expr.span.start;
    let ast = codegen.ast;

    let function = ast.get_decl(*callee);
    let Some((result, params, variadic)) = function.ty.and_then(|ty| ast.function_signature(ty)) else {
        return Err(Error::new(
            ErrorImpl::UnresolvedType {
                type_: ast.qualified_name(*callee),
            },
            position.clone(),
        ));
    };

    let expected = params.len();
    let accepted = if variadic {
        args.len() >= expected
    } else {
        args.len() == expected
    };
    if !accepted {
        return Err(Error::new(
            ErrorImpl::ParameterCountMismatch {
                function: ast.qualified_name(*callee),
                expected,
                received: args.len(),
            },
            position.clone(),
        ));
    }

    let symbol = codegen.symbol(*callee)?;
    let result = codegen.lower_type(result, position)?;
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(codegen.evaluate(arg)?);
    }

    codegen.emit(
        result,
        InstKind::Call {
            callee: symbol,
            args: values,
        },
    )
}

/// `cond ? a : b` joins both arms with a phi, unless the result is void.
pub fn gen_conditional(codegen: &mut CodeGen, expr: &Expr) -> Result<Operand, Error> {
    let ExprKind::Conditional {
        cond,
        then_expr,
        else_expr,
    } = &expr.kind
    else {
        return Err(Error::invariant("malformed conditional operator"));
    };

    let cond = gen_condition(codegen, cond)?;
    let then_block = codegen.append_block("cond.then")?;
    let else_block = codegen.append_block("cond.else")?;
    let end_block = codegen.append_block("cond.end")?;
    codegen.terminate(Terminator::CondBr {
        cond,
        then_block,
        else_block,
    })?;

    codegen.position_at_end(then_block);
    let then_value = codegen.evaluate(then_expr)?;
    let then_exit = codegen.current_block()?;
    codegen.emit_branch(end_block)?;

    codegen.position_at_end(else_block);
    let else_value = codegen.evaluate(else_expr)?;
    let else_exit = codegen.current_block()?;
    codegen.emit_branch(end_block)?;

    codegen.position_at_end(end_block);
    match codegen.lower_type(expr.ty, &expr.span.start)? {
        IrType::Void => Ok(Operand::void()),
        ty => codegen.emit(ty, InstKind::Phi(vec![(then_value, then_exit), (else_value, else_exit)])),
    }
}
