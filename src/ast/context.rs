use std::{collections::HashMap, rc::Rc};

use log::debug;

use crate::{errors::errors::Error, Span};

use super::{
    decls::{ContextId, Decl, DeclData, DeclId, DeclKind},
    types::{BuiltinClass, Type, TypeId},
};

/// Owns every declaration and interned type of one translation unit.
///
/// Declarations live in an arena and reference each other by [`DeclId`];
/// context membership is an intrusive singly linked chain so enumeration
/// keeps insertion order and appends are O(1).
pub struct AstContext {
    decls: Vec<Decl>,
    types: Vec<Type>,
    type_map: HashMap<Type, TypeId>,
    builtins: HashMap<BuiltinClass, TypeId>,
    translation_unit: ContextId,
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AstContext {
    pub fn new() -> Self {
        let mut ctx = AstContext {
            decls: vec![],
            types: vec![],
            type_map: HashMap::new(),
            builtins: HashMap::new(),
            translation_unit: ContextId(DeclId(0)),
        };

        let tu = ctx.create_decl(Decl::new(DeclKind::TranslationUnit, None, Span::null()));
        ctx.translation_unit = ContextId(tu);

        for class in BuiltinClass::ALL {
            let id = ctx.intern(Type::Builtin(class));
            ctx.builtins.insert(class, id);
        }

        ctx
    }

    pub fn translation_unit(&self) -> ContextId {
        self.translation_unit
    }

    // Declarations

    pub fn create_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn get_decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn get_decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Narrows a declaration to its DeclContext view.
    ///
    /// Asking for the context of a kind outside every context range is an
    /// invariant violation, not a user error.
    pub fn cast_to_decl_context(&self, decl: DeclId) -> Result<ContextId, Error> {
        self.as_decl_context(decl).ok_or_else(|| {
            Error::invariant(format!(
                "{} `{}` is not a declaration context",
                self.get_decl(decl).kind,
                self.get_decl(decl).name_str()
            ))
        })
    }

    /// Non-failing narrowing, for callers that only probe the capability.
    pub fn as_decl_context(&self, decl: DeclId) -> Option<ContextId> {
        if self.get_decl(decl).kind.is_decl_context() {
            Some(ContextId(decl))
        } else {
            None
        }
    }

    pub fn cast_from_decl_context(&self, context: ContextId) -> Result<DeclId, Error> {
        let decl = context.decl();
        if self.get_decl(decl).kind.is_decl_context() {
            Ok(decl)
        } else {
            Err(Error::invariant(format!(
                "context handle refers to a {}",
                self.get_decl(decl).kind
            )))
        }
    }

    /// The context that owns `context` itself, if any.
    pub fn parent_context(&self, context: ContextId) -> Option<ContextId> {
        self.get_decl(context.decl()).context
    }

    /// Appends `decl` to the chain of `context`.
    pub fn add_decl(&mut self, context: ContextId, decl: DeclId) -> Result<(), Error> {
        if let Some(owner) = self.get_decl(decl).context {
            return Err(Error::invariant(format!(
                "`{}` already belongs to context {:?}",
                self.get_decl(decl).name_str(),
                owner
            )));
        }

        let last = self.get_decl(context.decl()).chain.last;
        match last {
            Some(last) => self.get_decl_mut(last).next = Some(decl),
            None => self.get_decl_mut(context.decl()).chain.first = Some(decl),
        }

        {
            let added = self.get_decl_mut(decl);
            added.context = Some(context);
            added.next = None;
        }
        self.get_decl_mut(context.decl()).chain.last = Some(decl);

        self.on_new_decl_added(context, decl);
        Ok(())
    }

    /// Unlinks `decl` from the chain of `context`.
    pub fn remove_decl(&mut self, context: ContextId, decl: DeclId) -> Result<(), Error> {
        if !self.contains_decl(context, decl) {
            return Err(Error::invariant(format!(
                "`{}` is not a member of the context it is removed from",
                self.get_decl(decl).name_str()
            )));
        }

        let next = self.get_decl(decl).next;
        let previous = self.predecessor(context, decl);

        match previous {
            Some(previous) => self.get_decl_mut(previous).next = next,
            None => self.get_decl_mut(context.decl()).chain.first = next,
        }
        if self.get_decl(context.decl()).chain.last == Some(decl) {
            self.get_decl_mut(context.decl()).chain.last = previous;
        }

        let removed = self.get_decl_mut(decl);
        removed.context = None;
        removed.next = None;
        Ok(())
    }

    /// Puts `new` at the chain position of `old`, which leaves the context.
    pub fn replace_decl(&mut self, context: ContextId, old: DeclId, new: DeclId) -> Result<(), Error> {
        if !self.contains_decl(context, old) {
            return Err(Error::invariant(format!(
                "cannot replace `{}`, it is not a member of the context",
                self.get_decl(old).name_str()
            )));
        }
        if self.get_decl(new).context.is_some() {
            return Err(Error::invariant(format!(
                "replacement `{}` already belongs to a context",
                self.get_decl(new).name_str()
            )));
        }

        let next = self.get_decl(old).next;
        match self.predecessor(context, old) {
            Some(previous) => self.get_decl_mut(previous).next = Some(new),
            None => self.get_decl_mut(context.decl()).chain.first = Some(new),
        }
        if self.get_decl(context.decl()).chain.last == Some(old) {
            self.get_decl_mut(context.decl()).chain.last = Some(new);
        }

        {
            let replacement = self.get_decl_mut(new);
            replacement.context = Some(context);
            replacement.next = next;
        }
        {
            let replaced = self.get_decl_mut(old);
            replaced.context = None;
            replaced.next = None;
        }

        self.on_new_decl_added(context, new);
        Ok(())
    }

    /// Holds iff `decl` is owned by `context` and is still linked into its
    /// chain (it has a successor or it is the tail).
    pub fn contains_decl(&self, context: ContextId, decl: DeclId) -> bool {
        let entry = self.get_decl(decl);
        entry.context == Some(context)
            && (entry.next.is_some() || self.get_decl(context.decl()).chain.last == Some(decl))
    }

    /// Declarations of `context` in insertion order. Each call starts over.
    pub fn decls(&self, context: ContextId) -> DeclIter<'_> {
        DeclIter {
            ctx: self,
            current: self.get_decl(context.decl()).chain.first,
        }
    }

    pub fn is_empty_context(&self, context: ContextId) -> bool {
        self.get_decl(context.decl()).chain.first.is_none()
    }

    fn predecessor(&self, context: ContextId, decl: DeclId) -> Option<DeclId> {
        self.decls(context)
            .zip(self.decls(context).skip(1))
            .find(|(_, next)| *next == decl)
            .map(|(previous, _)| previous)
    }

    /// Lets specialized contexts react to a new member.
    fn on_new_decl_added(&mut self, context: ContextId, decl: DeclId) {
        let owner_kind = self.get_decl(context.decl()).kind;
        let member_kind = self.get_decl(decl).kind;
        let enum_value = self.get_decl(decl).enum_value();

        let chain = &mut self.get_decl_mut(context.decl()).chain;
        match (owner_kind, member_kind) {
            (DeclKind::Record, DeclKind::Field) => chain.field_count += 1,
            (DeclKind::Enum, DeclKind::EnumConstant) => chain.last_enum_value = enum_value,
            _ => {}
        }
    }

    pub fn field_count(&self, record: DeclId) -> usize {
        self.get_decl(record).chain.field_count
    }

    /// Value the next implicitly numbered enumerator of `enum_decl` gets.
    pub fn next_enum_value(&self, enum_decl: DeclId) -> i64 {
        self.get_decl(enum_decl)
            .chain
            .last_enum_value
            .map_or(0, |value| value.wrapping_add(1))
    }

    pub fn record_fields(&self, record: DeclId) -> Vec<DeclId> {
        match self.as_decl_context(record) {
            Some(context) => self
                .decls(context)
                .filter(|decl| self.get_decl(*decl).kind == DeclKind::Field)
                .collect(),
            None => vec![],
        }
    }

    pub fn field_index(&self, record: DeclId, field: DeclId) -> Option<usize> {
        self.record_fields(record)
            .iter()
            .position(|candidate| *candidate == field)
    }

    /// `outer::inner::name`, stopping below the translation unit.
    pub fn qualified_name(&self, decl: DeclId) -> String {
        let mut parts = vec![self.get_decl(decl).name_str().to_string()];
        let mut context = self.get_decl(decl).context;

        while let Some(current) = context {
            if current == self.translation_unit {
                break;
            }
            let owner = self.get_decl(current.decl());
            parts.push(owner.name_str().to_string());
            context = owner.context;
        }

        parts.reverse();
        parts.join("::")
    }

    // Types

    fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.type_map.get(&ty) {
            return *id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_map.insert(ty, id);
        id
    }

    pub fn get_type(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn get_builtin_type(&self, class: BuiltinClass) -> TypeId {
        self.builtins[&class]
    }

    pub fn get_array_type(&mut self, element: TypeId, count: u64) -> TypeId {
        self.intern(Type::Array { element, count })
    }

    pub fn get_function_type(&mut self, result: TypeId, params: Vec<TypeId>, variadic: bool) -> TypeId {
        self.intern(Type::Function {
            result,
            params,
            variadic,
        })
    }

    pub fn get_record_type(&mut self, record: DeclId) -> TypeId {
        self.intern(Type::Record(record))
    }

    pub fn get_enum_type(&mut self, enum_decl: DeclId) -> TypeId {
        self.intern(Type::Enum(enum_decl))
    }

    pub fn get_paren_type(&mut self, inner: TypeId) -> TypeId {
        self.intern(Type::Paren(inner))
    }

    pub fn get_typeof_type(&mut self, inner: TypeId) -> TypeId {
        self.intern(Type::TypeOf(inner))
    }

    pub fn get_auto_type(&mut self, deduced: Option<TypeId>) -> TypeId {
        self.intern(Type::Auto(deduced))
    }

    pub fn get_unresolved_type(&mut self, name: &str) -> TypeId {
        self.intern(Type::Unresolved(Rc::from(name)))
    }

    /// Strips Paren, TypeOf and deduced Auto wrappers, at any depth.
    pub fn underlying_type(&self, mut ty: TypeId) -> TypeId {
        loop {
            match self.get_type(ty) {
                Type::Paren(inner) | Type::TypeOf(inner) | Type::Auto(Some(inner)) => ty = *inner,
                _ => return ty,
            }
        }
    }

    /// Identity on unwrapped types.
    pub fn is_same_type(&self, a: TypeId, b: TypeId) -> bool {
        self.underlying_type(a) == self.underlying_type(b)
    }

    pub fn builtin_class(&self, ty: TypeId) -> Option<BuiltinClass> {
        match self.get_type(self.underlying_type(ty)) {
            Type::Builtin(class) => Some(*class),
            _ => None,
        }
    }

    /// The builtin class an operand behaves as in arithmetic. Enums act as
    /// their underlying integer type.
    pub fn arithmetic_class(&self, ty: TypeId) -> Option<BuiltinClass> {
        match self.get_type(self.underlying_type(ty)) {
            Type::Builtin(class) if class.is_arithmetic() => Some(*class),
            Type::Enum(decl) => self
                .get_decl(*decl)
                .ty
                .and_then(|underlying| self.builtin_class(underlying)),
            _ => None,
        }
    }

    pub fn is_void(&self, ty: TypeId) -> bool {
        self.builtin_class(ty) == Some(BuiltinClass::Void)
    }

    pub fn is_unresolved(&self, ty: TypeId) -> bool {
        matches!(
            self.get_type(self.underlying_type(ty)),
            Type::Unresolved(_) | Type::Auto(None)
        )
    }

    pub fn function_signature(&self, ty: TypeId) -> Option<(TypeId, &[TypeId], bool)> {
        match self.get_type(self.underlying_type(ty)) {
            Type::Function {
                result,
                params,
                variadic,
            } => Some((*result, params.as_slice(), *variadic)),
            _ => None,
        }
    }

    pub fn array_info(&self, ty: TypeId) -> Option<(TypeId, u64)> {
        match self.get_type(self.underlying_type(ty)) {
            Type::Array { element, count } => Some((*element, *count)),
            _ => None,
        }
    }

    pub fn record_decl(&self, ty: TypeId) -> Option<DeclId> {
        match self.get_type(self.underlying_type(ty)) {
            Type::Record(decl) => Some(*decl),
            _ => None,
        }
    }

    /// Size in bytes with natural alignment, used by the backends.
    pub fn type_size(&self, ty: TypeId) -> u64 {
        match self.get_type(self.underlying_type(ty)) {
            Type::Builtin(class) => class.size_in_bytes(),
            Type::Array { element, count } => self.type_size(*element) * count,
            Type::Enum(decl) => self.get_decl(*decl).ty.map_or(4, |ty| self.type_size(ty)),
            Type::Record(decl) => {
                let mut size: u64 = 0;
                let mut max_align = 1;
                for field in self.record_fields(*decl) {
                    let Some(field_ty) = self.get_decl(field).ty else {
                        continue;
                    };
                    let align = self.type_align(field_ty);
                    max_align = max_align.max(align);
                    size = size.div_ceil(align) * align + self.type_size(field_ty);
                }
                size.div_ceil(max_align) * max_align
            }
            _ => 0,
        }
    }

    pub fn type_align(&self, ty: TypeId) -> u64 {
        match self.get_type(self.underlying_type(ty)) {
            Type::Builtin(class) => class.size_in_bytes().max(1),
            Type::Array { element, .. } => self.type_align(*element),
            Type::Enum(decl) => self.get_decl(*decl).ty.map_or(4, |ty| self.type_align(ty)),
            Type::Record(decl) => self
                .record_fields(*decl)
                .iter()
                .filter_map(|field| self.get_decl(*field).ty)
                .map(|field_ty| self.type_align(field_ty))
                .max()
                .unwrap_or(1),
            _ => 1,
        }
    }

    /// Human readable spelling, as written in source where possible.
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.get_type(ty) {
            Type::Builtin(class) => class.spelling().to_string(),
            Type::Array { element, count } => format!("[{}; {}]", self.type_name(*element), count),
            Type::Function {
                result,
                params,
                variadic,
            } => {
                let mut params: Vec<String> = params.iter().map(|param| self.type_name(*param)).collect();
                if *variadic {
                    params.push(String::from("..."));
                }
                format!("fn({}) -> {}", params.join(", "), self.type_name(*result))
            }
            Type::Record(decl) | Type::Enum(decl) => self.qualified_name(*decl),
            Type::Paren(inner) => format!("({})", self.type_name(*inner)),
            Type::TypeOf(inner) => self.type_name(*inner),
            Type::Auto(Some(inner)) => self.type_name(*inner),
            Type::Auto(None) => String::from("auto"),
            Type::Unresolved(name) => format!("<unresolved {}>", name),
        }
    }

    /// Evaluates a declaration's alias target, if it is an alias.
    pub fn alias_target(&self, decl: DeclId) -> Option<super::decls::AliasTarget> {
        match &self.get_decl(decl).data {
            DeclData::Alias(target) => Some(*target),
            _ => None,
        }
    }

    pub fn dump_context(&self, context: ContextId) {
        for decl in self.decls(context) {
            let entry = self.get_decl(decl);
            debug!(
                "{} {} : {}",
                entry.kind,
                self.qualified_name(decl),
                entry.ty.map_or(String::from("-"), |ty| self.type_name(ty))
            );
        }
    }
}

/// Lazy, finite walk over a context chain.
pub struct DeclIter<'a> {
    ctx: &'a AstContext,
    current: Option<DeclId>,
}

impl<'a> Iterator for DeclIter<'a> {
    type Item = DeclId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.ctx.get_decl(current).next;
        Some(current)
    }
}
