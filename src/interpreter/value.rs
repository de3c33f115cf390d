use std::fmt::Display;

use crate::{
    ast::{
        context::AstContext,
        stmts::{BinaryOperator, UnaryOperator},
        types::{BuiltinClass, Type, TypeId},
    },
    errors::errors::{Error, ErrorImpl},
    sema::constant::wrap_integer,
    Position,
};

/// A runtime value. Integers of every width are kept as `i64`, already
/// wrapped to their type; unsigned 64-bit values keep their bit pattern.
/// Arrays and records are aggregates of their elements or fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Floating(f64),
    Aggregate(Vec<Value>),
    /// Result of calling a function returning `void`.
    Void,
}

impl Value {
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Integer(value) => *value,
            Value::Floating(value) => *value as i64,
            _ => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            Value::Integer(value) => *value as f64,
            Value::Floating(value) => *value,
            _ => 0.0,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(value) => *value != 0,
            Value::Floating(value) => *value != 0.0,
            Value::Aggregate(_) => true,
            Value::Void => false,
        }
    }

    pub fn from_bool(value: bool) -> Value {
        Value::Integer(value as i64)
    }

    /// The zero value of `ty`, which is what uninitialized variables hold.
    pub fn default_for(ast: &AstContext, ty: TypeId) -> Value {
        match ast.get_type(ast.underlying_type(ty)) {
            Type::Builtin(class) if class.is_floating() => Value::Floating(0.0),
            Type::Builtin(BuiltinClass::Void) => Value::Void,
            Type::Array { element, count } => {
                let element = Value::default_for(ast, *element);
                Value::Aggregate(vec![element; *count as usize])
            }
            Type::Record(record) => Value::Aggregate(
                ast.record_fields(*record)
                    .into_iter()
                    .map(|field| match ast.get_decl(field).ty {
                        Some(ty) => Value::default_for(ast, ty),
                        None => Value::Integer(0),
                    })
                    .collect(),
            ),
            _ => Value::Integer(0),
        }
    }

    /// Reads a `[char; N]` aggregate as text, up to its first zero byte.
    pub fn as_text(&self) -> Option<String> {
        let Value::Aggregate(elements) = self else {
            return None;
        };
        let bytes: Vec<u8> = elements
            .iter()
            .map(|element| element.as_int() as u8)
            .take_while(|byte| *byte != 0)
            .collect();
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Floating(value) => write!(f, "{}", value),
            Value::Aggregate(elements) => {
                write!(f, "[")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Void => write!(f, "void"),
        }
    }
}

/// Converts a scalar between builtin classes the way the matching cast
/// kind would.
pub fn convert(value: &Value, from: BuiltinClass, to: BuiltinClass) -> Value {
    if to == BuiltinClass::Bool {
        return Value::from_bool(value.is_truthy());
    }

    if to.is_floating() {
        let float = match value {
            Value::Integer(int) if !from.is_signed() && from.is_integer() => *int as u64 as f64,
            other => other.as_float(),
        };
        return match to {
            BuiltinClass::F32 => Value::Floating(float as f32 as f64),
            _ => Value::Floating(float),
        };
    }

    let int = match value {
        Value::Floating(float) if to == BuiltinClass::U64 => *float as u64 as i64,
        other => other.as_int(),
    };
    Value::Integer(wrap_integer(int, to))
}

fn int_result(value: i64, class: BuiltinClass) -> Value {
    Value::Integer(wrap_integer(value, class))
}

/// `lhs op rhs` for operands already converted to `class`. Logical
/// operators are short-circuited by the caller and never reach here.
pub fn binary_arith(
    op: BinaryOperator,
    class: BuiltinClass,
    lhs: &Value,
    rhs: &Value,
    position: &Position,
) -> Result<Value, Error> {
    if class.is_floating() {
        let (l, r) = (lhs.as_float(), rhs.as_float());
        let value = match op {
            BinaryOperator::Add => l + r,
            BinaryOperator::Sub => l - r,
            BinaryOperator::Mul => l * r,
            BinaryOperator::Div => l / r,
            BinaryOperator::Lt => return Ok(Value::from_bool(l < r)),
            BinaryOperator::Gt => return Ok(Value::from_bool(l > r)),
            BinaryOperator::Le => return Ok(Value::from_bool(l <= r)),
            BinaryOperator::Ge => return Ok(Value::from_bool(l >= r)),
            BinaryOperator::Eq => return Ok(Value::from_bool(l == r)),
            BinaryOperator::Ne => return Ok(Value::from_bool(l != r)),
            _ => return Err(invalid_opcode(op.spelling(), position)),
        };
        return Ok(match class {
            BuiltinClass::F32 => Value::Floating(value as f32 as f64),
            _ => Value::Floating(value),
        });
    }

    let (l, r) = (lhs.as_int(), rhs.as_int());
    let unsigned = !class.is_signed();
    let bits = class.bit_width().max(1);

    let value = match op {
        BinaryOperator::Add => l.wrapping_add(r),
        BinaryOperator::Sub => l.wrapping_sub(r),
        BinaryOperator::Mul => l.wrapping_mul(r),
        BinaryOperator::Div | BinaryOperator::Rem => {
            if r == 0 {
                return Err(Error::new(ErrorImpl::DivisionByZero, position.clone()));
            }
            match (op, unsigned) {
                (BinaryOperator::Div, true) => ((l as u64) / (r as u64)) as i64,
                (BinaryOperator::Div, false) => l.wrapping_div(r),
                (_, true) => ((l as u64) % (r as u64)) as i64,
                (_, false) => l.wrapping_rem(r),
            }
        }
        BinaryOperator::Shl => l.wrapping_shl(r as u32 % bits),
        BinaryOperator::Shr if unsigned => ((l as u64) >> (r as u32 % bits)) as i64,
        BinaryOperator::Shr => l >> (r as u32 % bits),
        BinaryOperator::BitAnd => l & r,
        BinaryOperator::BitXor => l ^ r,
        BinaryOperator::BitOr => l | r,
        BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::Le | BinaryOperator::Ge if unsigned => {
            let (l, r) = (l as u64, r as u64);
            return Ok(Value::from_bool(match op {
                BinaryOperator::Lt => l < r,
                BinaryOperator::Gt => l > r,
                BinaryOperator::Le => l <= r,
                _ => l >= r,
            }));
        }
        BinaryOperator::Lt => return Ok(Value::from_bool(l < r)),
        BinaryOperator::Gt => return Ok(Value::from_bool(l > r)),
        BinaryOperator::Le => return Ok(Value::from_bool(l <= r)),
        BinaryOperator::Ge => return Ok(Value::from_bool(l >= r)),
        BinaryOperator::Eq => return Ok(Value::from_bool(l == r)),
        BinaryOperator::Ne => return Ok(Value::from_bool(l != r)),
        _ => return Err(invalid_opcode(op.spelling(), position)),
    };
    Ok(int_result(value, class))
}

/// Prefix `+ - ! ~` on an operand of `class`. Increments are handled on
/// places by the interpreter.
pub fn unary_arith(op: UnaryOperator, class: BuiltinClass, operand: &Value, position: &Position) -> Result<Value, Error> {
    match op {
        UnaryOperator::Plus => Ok(operand.clone()),
        UnaryOperator::Minus if class.is_floating() => Ok(Value::Floating(-operand.as_float())),
        UnaryOperator::Minus => Ok(int_result(operand.as_int().wrapping_neg(), class)),
        UnaryOperator::Not => Ok(Value::from_bool(!operand.is_truthy())),
        UnaryOperator::BitNot if class.is_integer() => Ok(int_result(!operand.as_int(), class)),
        _ => Err(invalid_opcode(op.spelling(), position)),
    }
}

/// `value + delta` in `class`, for `++` and `--`.
pub fn step(value: &Value, class: BuiltinClass, delta: i64) -> Value {
    if class.is_floating() {
        Value::Floating(value.as_float() + delta as f64)
    } else {
        int_result(value.as_int().wrapping_add(delta), class)
    }
}

fn invalid_opcode(opcode: &str, position: &Position) -> Error {
    Error::new(
        ErrorImpl::InvalidOpcode {
            opcode: opcode.to_string(),
        },
        position.clone(),
    )
}
