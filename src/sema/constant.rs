use crate::ast::{
    context::AstContext,
    decls::DeclKind,
    stmts::{BinaryOperator, CastKind, Expr, ExprKind, UnaryOperator},
    types::BuiltinClass,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

impl ConstValue {
    pub fn as_int(&self) -> i64 {
        match self {
            ConstValue::Int(value) => *value,
            ConstValue::Float(value) => *value as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            ConstValue::Int(value) => *value as f64,
            ConstValue::Float(value) => *value,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ConstValue::Int(value) => *value != 0,
            ConstValue::Float(value) => *value != 0.0,
        }
    }
}

/// Truncates `value` to the width of `class` and extends it back,
/// following the signedness of `class`.
pub fn wrap_integer(value: i64, class: BuiltinClass) -> i64 {
    match class {
        BuiltinClass::Bool => (value != 0) as i64,
        BuiltinClass::I8 => value as i8 as i64,
        BuiltinClass::U8 | BuiltinClass::Char => value as u8 as i64,
        BuiltinClass::I16 => value as i16 as i64,
        BuiltinClass::U16 => value as u16 as i64,
        BuiltinClass::I32 => value as i32 as i64,
        BuiltinClass::U32 => value as u32 as i64,
        _ => value,
    }
}

/// Folds `expr` to a value when it only involves literals, enum constants,
/// `const` variables with constant initializers and pure operators.
pub fn evaluate_constant(ctx: &AstContext, expr: &Expr) -> Option<ConstValue> {
    let class = ctx.arithmetic_class(expr.ty);

    let value = match &expr.kind {
        ExprKind::IntegerLiteral(value) => ConstValue::Int(*value),
        ExprKind::FloatingLiteral(value) => ConstValue::Float(*value),
        ExprKind::BoolLiteral(value) => ConstValue::Int(*value as i64),
        ExprKind::CharLiteral(value) => ConstValue::Int(*value as i64),
        ExprKind::Paren(inner) => evaluate_constant(ctx, inner)?,
        ExprKind::DeclRef(decl) => {
            let entry = ctx.get_decl(*decl);
            match entry.kind {
                DeclKind::EnumConstant => ConstValue::Int(entry.enum_value()?),
                DeclKind::Var if entry.is_constant() => evaluate_constant(ctx, entry.init()?)?,
                _ => return None,
            }
        }
        ExprKind::ImplicitCast(cast) | ExprKind::AsType(cast) => {
            let operand = evaluate_constant(ctx, &cast.operand)?;
            match cast.kind {
                CastKind::NoOp | CastKind::IntegralCast => ConstValue::Int(operand.as_int()),
                CastKind::FloatingCast | CastKind::IntegralToFloating => ConstValue::Float(operand.as_float()),
                CastKind::FloatingToIntegral => ConstValue::Int(operand.as_float() as i64),
                CastKind::IntegralToBoolean | CastKind::FloatingToBoolean => {
                    ConstValue::Int(operand.is_truthy() as i64)
                }
            }
        }
        ExprKind::Unary { op, operand } => {
            let value = evaluate_constant(ctx, operand)?;
            match (op, value) {
                (UnaryOperator::Plus, value) => value,
                (UnaryOperator::Minus, ConstValue::Int(value)) => ConstValue::Int(value.wrapping_neg()),
                (UnaryOperator::Minus, ConstValue::Float(value)) => ConstValue::Float(-value),
                (UnaryOperator::Not, value) => ConstValue::Int(!value.is_truthy() as i64),
                (UnaryOperator::BitNot, ConstValue::Int(value)) => ConstValue::Int(!value),
                _ => return None,
            }
        }
        ExprKind::Binary(binary) => {
            let lhs = evaluate_constant(ctx, &binary.lhs)?;
            if binary.op == BinaryOperator::LAnd && !lhs.is_truthy() {
                return Some(ConstValue::Int(0));
            }
            if binary.op == BinaryOperator::LOr && lhs.is_truthy() {
                return Some(ConstValue::Int(1));
            }
            let rhs = evaluate_constant(ctx, &binary.rhs)?;
            let operand_class = ctx.arithmetic_class(binary.lhs.ty)?;
            fold_binary(binary.op, lhs, rhs, operand_class)?
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            if evaluate_constant(ctx, cond)?.is_truthy() {
                evaluate_constant(ctx, then_expr)?
            } else {
                evaluate_constant(ctx, else_expr)?
            }
        }
        _ => return None,
    };

    Some(match (value, class) {
        (ConstValue::Int(value), Some(class)) if class.is_integer() => ConstValue::Int(wrap_integer(value, class)),
        (ConstValue::Float(value), Some(BuiltinClass::F32)) => ConstValue::Float(value as f32 as f64),
        (value, _) => value,
    })
}

/// Folds one binary operation whose operands were converted to `class`.
/// Division by zero does not fold.
pub fn fold_binary(op: BinaryOperator, lhs: ConstValue, rhs: ConstValue, class: BuiltinClass) -> Option<ConstValue> {
    if class.is_floating() {
        let (a, b) = (lhs.as_float(), rhs.as_float());
        let value = match op {
            BinaryOperator::Add => ConstValue::Float(a + b),
            BinaryOperator::Sub => ConstValue::Float(a - b),
            BinaryOperator::Mul => ConstValue::Float(a * b),
            BinaryOperator::Div => ConstValue::Float(a / b),
            BinaryOperator::Lt => ConstValue::Int((a < b) as i64),
            BinaryOperator::Gt => ConstValue::Int((a > b) as i64),
            BinaryOperator::Le => ConstValue::Int((a <= b) as i64),
            BinaryOperator::Ge => ConstValue::Int((a >= b) as i64),
            BinaryOperator::Eq => ConstValue::Int((a == b) as i64),
            BinaryOperator::Ne => ConstValue::Int((a != b) as i64),
            BinaryOperator::LAnd => ConstValue::Int((a != 0.0 && b != 0.0) as i64),
            BinaryOperator::LOr => ConstValue::Int((a != 0.0 || b != 0.0) as i64),
            _ => return None,
        };
        return Some(value);
    }

    let (a, b) = (lhs.as_int(), rhs.as_int());
    let signed = class.is_signed();
    let (ua, ub) = (a as u64, b as u64);
    // Shift amounts wrap at the operand width
    let shift = b as u32 % class.bit_width().max(1);

    let value = match op {
        BinaryOperator::Add => a.wrapping_add(b),
        BinaryOperator::Sub => a.wrapping_sub(b),
        BinaryOperator::Mul => a.wrapping_mul(b),
        BinaryOperator::Div | BinaryOperator::Rem if b == 0 => return None,
        BinaryOperator::Div if signed => a.wrapping_div(b),
        BinaryOperator::Div => (ua / ub) as i64,
        BinaryOperator::Rem if signed => a.wrapping_rem(b),
        BinaryOperator::Rem => (ua % ub) as i64,
        BinaryOperator::Shl => a.wrapping_shl(shift),
        BinaryOperator::Shr if signed => a.wrapping_shr(shift),
        BinaryOperator::Shr => ua.wrapping_shr(shift) as i64,
        BinaryOperator::BitAnd => a & b,
        BinaryOperator::BitXor => a ^ b,
        BinaryOperator::BitOr => a | b,
        BinaryOperator::Lt if signed => (a < b) as i64,
        BinaryOperator::Lt => (ua < ub) as i64,
        BinaryOperator::Gt if signed => (a > b) as i64,
        BinaryOperator::Gt => (ua > ub) as i64,
        BinaryOperator::Le if signed => (a <= b) as i64,
        BinaryOperator::Le => (ua <= ub) as i64,
        BinaryOperator::Ge if signed => (a >= b) as i64,
        BinaryOperator::Ge => (ua >= ub) as i64,
        BinaryOperator::Eq => (a == b) as i64,
        BinaryOperator::Ne => (a != b) as i64,
        BinaryOperator::LAnd => (a != 0 && b != 0) as i64,
        BinaryOperator::LOr => (a != 0 || b != 0) as i64,
        _ => return None,
    };

    Some(ConstValue::Int(wrap_integer(value, class)))
}
