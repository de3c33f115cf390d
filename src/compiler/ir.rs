//! Target-independent intermediate form produced by the code generator.
//!
//! The shape follows LLVM closely so a native backend can translate it one
//! instruction at a time: a [`Module`] holds globals and functions, a
//! defined [`Function`] is a list of basic [`Block`]s, and every block ends
//! in exactly one [`Terminator`]. Values are numbered registers local to
//! their function.
//!
//! The `Display` implementations print the textual form used by
//! `--dump-ir` and by `compile` when no native backend is selected.

use std::{collections::HashSet, fmt::Display};

#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Array(Box<IrType>, u64),
    Struct(Vec<IrType>),
}

impl IrType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, IrType::Array(..) | IrType::Struct(_))
    }

    pub fn bit_width(&self) -> u32 {
        match self {
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I16 => 16,
            IrType::I32 | IrType::F32 => 32,
            IrType::I64 | IrType::F64 | IrType::Ptr => 64,
            _ => 0,
        }
    }
}

impl Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I16 => write!(f, "i16"),
            IrType::I32 => write!(f, "i32"),
            IrType::I64 => write!(f, "i64"),
            IrType::F32 => write!(f, "float"),
            IrType::F64 => write!(f, "double"),
            IrType::Ptr => write!(f, "ptr"),
            IrType::Array(element, count) => write!(f, "[{} x {}]", count, element),
            IrType::Struct(fields) => {
                write!(f, "{{ ")?;
                for (index, field) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// A register defined by one instruction or bound to one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Register(ValueId),
    Int(i64),
    Float(f64),
    /// Address of a module global.
    Global(String),
    /// The all-zero value of an aggregate type.
    Zero,
    /// Result of a call returning `void`; never used as an input.
    Void,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub ty: IrType,
    pub kind: OperandKind,
}

impl Operand {
    pub fn register(ty: IrType, id: ValueId) -> Self {
        Operand {
            ty,
            kind: OperandKind::Register(id),
        }
    }

    pub fn int(ty: IrType, value: i64) -> Self {
        Operand {
            ty,
            kind: OperandKind::Int(value),
        }
    }

    pub fn float(ty: IrType, value: f64) -> Self {
        Operand {
            ty,
            kind: OperandKind::Float(value),
        }
    }

    pub fn bool(value: bool) -> Self {
        Operand::int(IrType::I1, value as i64)
    }

    pub fn global(name: impl Into<String>) -> Self {
        Operand {
            ty: IrType::Ptr,
            kind: OperandKind::Global(name.into()),
        }
    }

    pub fn void() -> Self {
        Operand {
            ty: IrType::Void,
            kind: OperandKind::Void,
        }
    }

    /// The zero value of `ty`.
    pub fn zero(ty: IrType) -> Self {
        match ty {
            IrType::F32 | IrType::F64 => Operand::float(ty, 0.0),
            IrType::Array(..) | IrType::Struct(_) => Operand {
                ty,
                kind: OperandKind::Zero,
            },
            IrType::Void => Operand::void(),
            _ => Operand::int(ty, 0),
        }
    }

    pub fn as_register(&self) -> Option<ValueId> {
        match self.kind {
            OperandKind::Register(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            OperandKind::Int(_) | OperandKind::Float(_) | OperandKind::Zero
        )
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            OperandKind::Register(id) => write!(f, "%{}", id.0),
            OperandKind::Int(value) if self.ty == IrType::I1 => {
                write!(f, "{}", if *value != 0 { "true" } else { "false" })
            }
            OperandKind::Int(value) => write!(f, "{}", value),
            OperandKind::Float(value) => write!(f, "{:?}", value),
            OperandKind::Global(name) => write!(f, "@{}", name),
            OperandKind::Zero => write!(f, "zeroinitializer"),
            OperandKind::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SRem => "srem",
            BinaryOp::URem => "urem",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sgt,
    Sle,
    Sge,
    Ult,
    Ugt,
    Ule,
    Uge,
}

impl IntPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Ule => "ule",
            IntPredicate::Uge => "uge",
        }
    }
}

/// Ordered comparisons only: a NaN operand compares false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ogt,
    Ole,
    Oge,
}

impl FloatPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Oge => "oge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    SIToFP,
    UIToFP,
    FPToSI,
    FPToUI,
}

impl CastOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::SIToFP => "sitofp",
            CastOp::UIToFP => "uitofp",
            CastOp::FPToSI => "fptosi",
            CastOp::FPToUI => "fptoui",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Stack slot of the instruction's `allocated` type; the result is a
    /// pointer.
    Alloca(IrType),
    Load(Operand),
    Store { value: Operand, ptr: Operand },
    Binary { op: BinaryOp, lhs: Operand, rhs: Operand },
    ICmp { pred: IntPredicate, lhs: Operand, rhs: Operand },
    FCmp { pred: FloatPredicate, lhs: Operand, rhs: Operand },
    Cast { op: CastOp, value: Operand },
    /// Address of an element inside `aggregate`, which `ptr` points to.
    ElementPtr {
        aggregate: IrType,
        ptr: Operand,
        indices: Vec<Operand>,
    },
    Call { callee: String, args: Vec<Operand> },
    Phi(Vec<(Operand, BlockId)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// `None` for stores and calls returning `void`.
    pub result: Option<ValueId>,
    /// Type of the result.
    pub ty: IrType,
    pub kind: InstKind,
}

impl Instruction {
    pub fn operands(&self) -> Vec<&Operand> {
        match &self.kind {
            InstKind::Alloca(_) => vec![],
            InstKind::Load(ptr) => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::ElementPtr { ptr, indices, .. } => {
                let mut operands = vec![ptr];
                operands.extend(indices.iter());
                operands
            }
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Phi(incoming) => incoming.iter().map(|(value, _)| value).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret(Option<Operand>),
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Ret(_) | Terminator::Unreachable => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<IrType>,
    pub result: IrType,
    pub variadic: bool,
    /// Empty for a declaration.
    pub blocks: Vec<Block>,
    next_value: u32,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<IrType>, result: IrType, variadic: bool) -> Self {
        let next_value = params.len() as u32;
        Function {
            name: name.into(),
            params,
            result,
            variadic,
            blocks: vec![],
            next_value,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Parameters occupy the first registers.
    pub fn param(&self, index: usize) -> Option<Operand> {
        self.params
            .get(index)
            .map(|ty| Operand::register(ty.clone(), ValueId(index as u32)))
    }

    pub fn next_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Appends an empty block. Names are made unique with a numeric
    /// suffix.
    pub fn append_block(&mut self, name: &str) -> BlockId {
        let taken = |candidate: &str| self.blocks.iter().any(|block| block.name == candidate);
        let mut unique = name.to_string();
        let mut suffix = 1;
        while taken(&unique) {
            unique = format!("{}{}", name, suffix);
            suffix += 1;
        }

        self.blocks.push(Block {
            name: unique,
            instructions: vec![],
            terminator: None,
        });
        BlockId(self.blocks.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn block_named(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|block| block.name == name)
            .map(BlockId)
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| {
                block
                    .terminator
                    .as_ref()
                    .is_some_and(|terminator| terminator.successors().contains(&id))
            })
            .map(|(index, _)| BlockId(index))
            .collect()
    }

    /// Drops every block other than the entry that no branch can reach,
    /// then renumbers the survivors. Phi entries from dropped blocks go
    /// too. Returns how many blocks were dropped.
    pub fn remove_unreachable_blocks(&mut self) -> usize {
        if self.blocks.is_empty() {
            return 0;
        }

        let mut reachable = HashSet::new();
        let mut pending = vec![BlockId(0)];
        while let Some(id) = pending.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(terminator) = &self.blocks[id.0].terminator {
                pending.extend(terminator.successors());
            }
        }

        let removed = self.blocks.len() - reachable.len();
        if removed == 0 {
            return 0;
        }

        let mut remap = vec![None; self.blocks.len()];
        let mut next = 0;
        for (index, slot) in remap.iter_mut().enumerate() {
            if reachable.contains(&BlockId(index)) {
                *slot = Some(BlockId(next));
                next += 1;
            }
        }

        let blocks = std::mem::take(&mut self.blocks);
        for (index, mut block) in blocks.into_iter().enumerate() {
            if remap[index].is_none() {
                continue;
            }
            for instruction in &mut block.instructions {
                if let InstKind::Phi(incoming) = &mut instruction.kind {
                    incoming.retain(|(_, from)| remap[from.0].is_some());
                    for (_, from) in incoming.iter_mut() {
                        *from = remap[from.0].unwrap_or(*from);
                    }
                }
            }
            if let Some(terminator) = &mut block.terminator {
                match terminator {
                    Terminator::Br(target) => *target = remap[target.0].unwrap_or(*target),
                    Terminator::CondBr {
                        then_block,
                        else_block,
                        ..
                    } => {
                        *then_block = remap[then_block.0].unwrap_or(*then_block);
                        *else_block = remap[else_block.0].unwrap_or(*else_block);
                    }
                    Terminator::Ret(_) | Terminator::Unreachable => {}
                }
            }
            self.blocks.push(block);
        }
        removed
    }

    /// Every call instruction in the function, in block order.
    pub fn calls(&self) -> Vec<(&str, &[Operand])> {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions.iter())
            .filter_map(|instruction| match &instruction.kind {
                InstKind::Call { callee, args } => Some((callee.as_str(), args.as_slice())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    Zero,
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub init: GlobalInit,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            globals: vec![],
            functions: vec![],
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn get_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|global| global.name == name)
    }

    /// Adds `function`, replacing a declaration of the same name.
    pub fn add_function(&mut self, function: Function) {
        match self
            .functions
            .iter_mut()
            .find(|existing| existing.name == function.name)
        {
            Some(existing) => *existing = function,
            None => self.functions.push(function),
        }
    }

    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }
}

fn write_separated<T: Display>(f: &mut std::fmt::Formatter<'_>, items: impl IntoIterator<Item = T>) -> std::fmt::Result {
    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

struct Typed<'a>(&'a Operand);

impl Display for Typed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0.ty, self.0)
    }
}

impl Display for GlobalInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalInit::Zero => write!(f, "zeroinitializer"),
            GlobalInit::Int(value) => write!(f, "{}", value),
            GlobalInit::Float(value) => write!(f, "{:?}", value),
            GlobalInit::Bytes(bytes) => {
                write!(f, "c\"")?;
                for byte in bytes {
                    if byte.is_ascii_graphic() && *byte != b'"' && *byte != b'\\' || *byte == b' ' {
                        write!(f, "{}", *byte as char)?;
                    } else {
                        write!(f, "\\{:02X}", byte)?;
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

impl Display for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = if self.constant { "constant" } else { "global" };
        write!(f, "@{} = {} {} {}", self.name, keyword, self.ty, self.init)
    }
}

impl Function {
    fn fmt_instruction(&self, f: &mut std::fmt::Formatter<'_>, instruction: &Instruction) -> std::fmt::Result {
        write!(f, "  ")?;
        if let Some(result) = instruction.result {
            write!(f, "%{} = ", result.0)?;
        }
        match &instruction.kind {
            InstKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstKind::Load(ptr) => write!(f, "load {}, {}", instruction.ty, Typed(ptr)),
            InstKind::Store { value, ptr } => write!(f, "store {}, {}", Typed(value), Typed(ptr)),
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}, {}", op.mnemonic(), lhs.ty, lhs, rhs)
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                write!(f, "icmp {} {} {}, {}", pred.mnemonic(), lhs.ty, lhs, rhs)
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                write!(f, "fcmp {} {} {}, {}", pred.mnemonic(), lhs.ty, lhs, rhs)
            }
            InstKind::Cast { op, value } => {
                write!(f, "{} {} to {}", op.mnemonic(), Typed(value), instruction.ty)
            }
            InstKind::ElementPtr {
                aggregate,
                ptr,
                indices,
            } => {
                write!(f, "getelementptr {}, {}, ", aggregate, Typed(ptr))?;
                write_separated(f, indices.iter().map(Typed))
            }
            InstKind::Call { callee, args } => {
                write!(f, "call {} @{}(", instruction.ty, callee)?;
                write_separated(f, args.iter().map(Typed))?;
                write!(f, ")")
            }
            InstKind::Phi(incoming) => {
                write!(f, "phi {} ", instruction.ty)?;
                write_separated(
                    f,
                    incoming
                        .iter()
                        .map(|(value, from)| format!("[ {}, %{} ]", value, self.block(*from).name)),
                )
            }
        }?;
        writeln!(f)
    }

    fn fmt_terminator(&self, f: &mut std::fmt::Formatter<'_>, terminator: &Terminator) -> std::fmt::Result {
        match terminator {
            Terminator::Ret(None) => writeln!(f, "  ret void"),
            Terminator::Ret(Some(value)) => writeln!(f, "  ret {}", Typed(value)),
            Terminator::Br(target) => writeln!(f, "  br label %{}", self.block(*target).name),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => writeln!(
                f,
                "  br {}, label %{}, label %{}",
                Typed(cond),
                self.block(*then_block).name,
                self.block(*else_block).name
            ),
            Terminator::Unreachable => writeln!(f, "  unreachable"),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{} {} @{}(", keyword, self.result, self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            if self.is_declaration() {
                write!(f, "{}", param)?;
            } else {
                write!(f, "{} %{}", param, index)?;
            }
        }
        if self.variadic {
            write!(f, "{}...", if self.params.is_empty() { "" } else { ", " })?;
        }
        write!(f, ")")?;

        if self.is_declaration() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.name)?;
            for instruction in &block.instructions {
                self.fmt_instruction(f, instruction)?;
            }
            if let Some(terminator) = &block.terminator {
                self.fmt_terminator(f, terminator)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "{}", global)?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}
