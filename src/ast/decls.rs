use std::{fmt::Display, rc::Rc};

use bitflags::bitflags;

use crate::Span;

use super::{
    attributes::Attribute,
    stmts::{ExprPtr, StmtPtr},
    types::TypeId,
};

/// Handle to a [`Decl`] stored in an [`AstContext`].
///
/// [`AstContext`]: super::context::AstContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The DeclContext view of a context-bearing declaration.
///
/// Only [`AstContext::cast_to_decl_context`] hands these out, after checking
/// the declaration kind against [`DECL_CONTEXT_RANGES`].
///
/// [`AstContext::cast_to_decl_context`]: super::context::AstContext::cast_to_decl_context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) DeclId);

impl ContextId {
    pub fn decl(&self) -> DeclId {
        self.0
    }
}

/// Declaration kinds. The order matters: [`DECL_CONTEXT_RANGES`] and the
/// tag/type ranges below are expressed as `first..=last` over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DeclKind {
    TranslationUnit,
    Module,
    Function,
    Enum,
    Record,
    Alias,
    Var,
    ParmVar,
    Field,
    EnumConstant,
    Label,
    Unresolved,
}

#[derive(Debug, Clone, Copy)]
pub struct DeclKindRange {
    pub first: DeclKind,
    pub last: DeclKind,
}

impl DeclKindRange {
    pub const fn new(first: DeclKind, last: DeclKind) -> Self {
        DeclKindRange { first, last }
    }

    pub fn contains(&self, kind: DeclKind) -> bool {
        (self.first as u8..=self.last as u8).contains(&(kind as u8))
    }
}

/// Every kind that can own a chain of declarations.
pub const DECL_CONTEXT_RANGES: &[DeclKindRange] = &[
    DeclKindRange::new(DeclKind::TranslationUnit, DeclKind::TranslationUnit),
    DeclKindRange::new(DeclKind::Module, DeclKind::Module),
    DeclKindRange::new(DeclKind::Function, DeclKind::Function),
    DeclKindRange::new(DeclKind::Enum, DeclKind::Record),
];

pub const TAG_DECL_RANGE: DeclKindRange = DeclKindRange::new(DeclKind::Enum, DeclKind::Record);
pub const TYPE_DECL_RANGE: DeclKindRange = DeclKindRange::new(DeclKind::Enum, DeclKind::Alias);
pub const VAR_DECL_RANGE: DeclKindRange = DeclKindRange::new(DeclKind::Var, DeclKind::Field);

bitflags! {
    /// Lookup namespaces. Tags and ordinary names are separate, so a type
    /// and a variable may share a spelling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IdentifierNamespace: u8 {
        const ORDINARY = 1 << 0;
        const TAG      = 1 << 1;
        const LABEL    = 1 << 2;
        const MEMBER   = 1 << 3;
        const MODULE   = 1 << 4;
    }
}

impl DeclKind {
    pub fn is_decl_context(&self) -> bool {
        DECL_CONTEXT_RANGES.iter().any(|range| range.contains(*self))
    }

    pub fn is_tag(&self) -> bool {
        TAG_DECL_RANGE.contains(*self)
    }

    pub fn is_type_decl(&self) -> bool {
        TYPE_DECL_RANGE.contains(*self)
    }

    pub fn is_variable(&self) -> bool {
        VAR_DECL_RANGE.contains(*self)
    }

    pub fn is_value_decl(&self) -> bool {
        *self == DeclKind::Function || *self == DeclKind::EnumConstant || self.is_variable()
    }

    pub fn namespace(&self) -> IdentifierNamespace {
        match self {
            DeclKind::TranslationUnit => IdentifierNamespace::empty(),
            DeclKind::Module => IdentifierNamespace::MODULE,
            DeclKind::Function | DeclKind::Var | DeclKind::ParmVar | DeclKind::EnumConstant => {
                IdentifierNamespace::ORDINARY
            }
            DeclKind::Enum | DeclKind::Record => IdentifierNamespace::TAG,
            // An alias may name a type or a module
            DeclKind::Alias => IdentifierNamespace::TAG | IdentifierNamespace::MODULE,
            DeclKind::Field => IdentifierNamespace::MEMBER,
            DeclKind::Label => IdentifierNamespace::LABEL,
            // Placeholders must be found by whatever lookup comes first
            DeclKind::Unresolved => IdentifierNamespace::all(),
        }
    }
}

impl Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    #[default]
    None,
    Extern,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasTarget {
    Type(TypeId),
    Module(DeclId),
}

/// Index of a cached declarator owned by Sema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclaratorId(pub usize);

#[derive(Debug, Clone)]
pub enum DeclData {
    None,
    Function {
        params: Vec<DeclId>,
        body: Option<StmtPtr>,
    },
    /// Var, ParmVar and Field. `constant` marks `const` bindings, which are
    /// not assignable after initialization.
    Variable {
        init: Option<ExprPtr>,
        constant: bool,
    },
    EnumConstant {
        value: i64,
        init: Option<ExprPtr>,
    },
    Alias(AliasTarget),
    Label {
        defined: bool,
    },
    Unresolved {
        declarator: DeclaratorId,
    },
}

/// Head and tail of the declarations owned by a context, plus the small
/// amount of bookkeeping specialized contexts keep when a member is added.
#[derive(Debug, Clone, Default)]
pub struct DeclChain {
    pub(crate) first: Option<DeclId>,
    pub(crate) last: Option<DeclId>,
    pub(crate) field_count: usize,
    pub(crate) last_enum_value: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub name: Option<Rc<str>>,
    pub span: Span,
    pub ty: Option<TypeId>,
    pub storage: StorageClass,
    pub data: DeclData,
    pub attributes: Vec<Rc<dyn Attribute>>,
    pub(crate) context: Option<ContextId>,
    pub(crate) next: Option<DeclId>,
    pub(crate) chain: DeclChain,
}

impl Decl {
    pub fn new(kind: DeclKind, name: Option<Rc<str>>, span: Span) -> Self {
        let data = match kind {
            DeclKind::Function => DeclData::Function {
                params: vec![],
                body: None,
            },
            DeclKind::Var | DeclKind::ParmVar | DeclKind::Field => DeclData::Variable {
                init: None,
                constant: false,
            },
            DeclKind::Label => DeclData::Label { defined: false },
            _ => DeclData::None,
        };

        Decl {
            kind,
            name,
            span,
            ty: None,
            storage: StorageClass::None,
            data,
            attributes: vec![],
            context: None,
            next: None,
            chain: DeclChain::default(),
        }
    }

    pub fn with_type(mut self, ty: TypeId) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_storage(mut self, storage: StorageClass) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_data(mut self, data: DeclData) -> Self {
        self.data = data;
        self
    }

    pub fn get_context(&self) -> Option<ContextId> {
        self.context
    }

    pub fn get_next(&self) -> Option<DeclId> {
        self.next
    }

    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    pub fn is_extern(&self) -> bool {
        self.storage == StorageClass::Extern
    }

    pub fn params(&self) -> &[DeclId] {
        match &self.data {
            DeclData::Function { params, .. } => params,
            _ => &[],
        }
    }

    pub fn body(&self) -> Option<&StmtPtr> {
        match &self.data {
            DeclData::Function { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn init(&self) -> Option<&ExprPtr> {
        match &self.data {
            DeclData::Variable { init, .. } => init.as_ref(),
            DeclData::EnumConstant { init, .. } => init.as_ref(),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.data, DeclData::Variable { constant: true, .. })
    }

    pub fn enum_value(&self) -> Option<i64> {
        match &self.data {
            DeclData::EnumConstant { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn declarator(&self) -> Option<DeclaratorId> {
        match &self.data {
            DeclData::Unresolved { declarator } => Some(*declarator),
            _ => None,
        }
    }

    pub fn get_attribute<T: 'static>(&self) -> Option<&T> {
        self.attributes
            .iter()
            .find_map(|attribute| attribute.as_any().downcast_ref::<T>())
    }
}
