use std::{fmt::Display, rc::Rc};

use super::decls::DeclId;

/// Handle to an interned [`Type`] inside an [`AstContext`].
///
/// Two handles are equal exactly when the interned types are structurally
/// equal, so comparing handles of unwrapped types is type identity.
///
/// [`AstContext`]: super::context::AstContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinClass {
    Void,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl BuiltinClass {
    pub const ALL: [BuiltinClass; 13] = [
        BuiltinClass::Void,
        BuiltinClass::Bool,
        BuiltinClass::Char,
        BuiltinClass::I8,
        BuiltinClass::U8,
        BuiltinClass::I16,
        BuiltinClass::U16,
        BuiltinClass::I32,
        BuiltinClass::U32,
        BuiltinClass::I64,
        BuiltinClass::U64,
        BuiltinClass::F32,
        BuiltinClass::F64,
    ];

    pub fn spelling(&self) -> &'static str {
        match self {
            BuiltinClass::Void => "void",
            BuiltinClass::Bool => "bool",
            BuiltinClass::Char => "char",
            BuiltinClass::I8 => "i8",
            BuiltinClass::U8 => "u8",
            BuiltinClass::I16 => "i16",
            BuiltinClass::U16 => "u16",
            BuiltinClass::I32 => "i32",
            BuiltinClass::U32 => "u32",
            BuiltinClass::I64 => "i64",
            BuiltinClass::U64 => "u64",
            BuiltinClass::F32 => "f32",
            BuiltinClass::F64 => "f64",
        }
    }

    pub fn from_spelling(spelling: &str) -> Option<BuiltinClass> {
        BuiltinClass::ALL
            .iter()
            .copied()
            .find(|class| class.spelling() == spelling)
    }

    /// Bool and char count as (unsigned) integers.
    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            BuiltinClass::Void | BuiltinClass::F32 | BuiltinClass::F64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, BuiltinClass::F32 | BuiltinClass::F64)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            BuiltinClass::I8
                | BuiltinClass::I16
                | BuiltinClass::I32
                | BuiltinClass::I64
                | BuiltinClass::F32
                | BuiltinClass::F64
        )
    }

    /// Conversion rank. Integers of equal width share a rank, and every
    /// floating type outranks every integer type.
    pub fn rank(&self) -> u8 {
        match self {
            BuiltinClass::Void => 0,
            BuiltinClass::Bool => 1,
            BuiltinClass::Char => 2,
            BuiltinClass::I8 | BuiltinClass::U8 => 3,
            BuiltinClass::I16 | BuiltinClass::U16 => 4,
            BuiltinClass::I32 | BuiltinClass::U32 => 5,
            BuiltinClass::I64 | BuiltinClass::U64 => 6,
            BuiltinClass::F32 => 7,
            BuiltinClass::F64 => 8,
        }
    }

    pub fn bit_width(&self) -> u32 {
        match self {
            BuiltinClass::Void => 0,
            BuiltinClass::Bool => 1,
            BuiltinClass::Char | BuiltinClass::I8 | BuiltinClass::U8 => 8,
            BuiltinClass::I16 | BuiltinClass::U16 => 16,
            BuiltinClass::I32 | BuiltinClass::U32 | BuiltinClass::F32 => 32,
            BuiltinClass::I64 | BuiltinClass::U64 | BuiltinClass::F64 => 64,
        }
    }

    pub fn size_in_bytes(&self) -> u64 {
        match self {
            BuiltinClass::Void => 0,
            BuiltinClass::Bool => 1,
            other => (other.bit_width() / 8) as u64,
        }
    }
}

impl Display for BuiltinClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

/// Type variants. Paren, TypeOf and Auto are sugar that
/// [`AstContext::underlying_type`] strips before any comparison.
///
/// [`AstContext::underlying_type`]: super::context::AstContext::underlying_type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(BuiltinClass),
    Array {
        element: TypeId,
        count: u64,
    },
    Function {
        result: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
    },
    Record(DeclId),
    Enum(DeclId),
    Paren(TypeId),
    /// `typeof(expr)`, holding the type of the expression.
    TypeOf(TypeId),
    /// `None` until the initializer deduces it.
    Auto(Option<TypeId>),
    Unresolved(Rc<str>),
}

impl Type {
    pub fn class(&self) -> TypeClass {
        match self {
            Type::Builtin(_) => TypeClass::Builtin,
            Type::Array { .. } => TypeClass::Array,
            Type::Function { .. } => TypeClass::Function,
            Type::Record(_) => TypeClass::Record,
            Type::Enum(_) => TypeClass::Enum,
            Type::Paren(_) => TypeClass::Paren,
            Type::TypeOf(_) => TypeClass::TypeOf,
            Type::Auto(_) => TypeClass::Auto,
            Type::Unresolved(_) => TypeClass::Unresolved,
        }
    }

    pub fn is_sugar(&self) -> bool {
        matches!(
            self,
            Type::Paren(_) | Type::TypeOf(_) | Type::Auto(Some(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Builtin,
    Array,
    Function,
    Record,
    Enum,
    Paren,
    TypeOf,
    Auto,
    Unresolved,
}
