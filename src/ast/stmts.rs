use std::{fmt::Display, rc::Rc};

use crate::{lexer::tokens::TokenKind, Span};

use super::{decls::DeclId, types::TypeId};

pub type StmtPtr = Rc<Stmt>;
pub type ExprPtr = Rc<Expr>;

/// Every concrete node class plus the two abstract roots and the abstract
/// `CastExpr`. [`StmtClass::base`] is the fallback chain visitors follow
/// when a `visit_*` method is not overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtClass {
    Stmt,
    NullStmt,
    CompoundStmt,
    DeclStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForStmt,
    BreakStmt,
    ContinueStmt,
    ReturnStmt,
    LabelStmt,
    GotoStmt,

    Expr,
    IntegerLiteral,
    FloatingLiteral,
    BoolLiteral,
    CharLiteral,
    StringLiteral,
    DeclRefExpr,
    OverloadSetExpr,
    ParenExpr,
    UnaryOperator,
    BinaryOperator,
    CompoundAssignOperator,
    CallExpr,
    MemberExpr,
    ArraySubscriptExpr,
    ConditionalOperator,
    CastExpr,
    ImplicitCastExpr,
    AsTypeExpr,
    RecoveryExpr,
}

impl StmtClass {
    pub fn base(&self) -> Option<StmtClass> {
        match self {
            StmtClass::Stmt | StmtClass::Expr => None,
            StmtClass::NullStmt
            | StmtClass::CompoundStmt
            | StmtClass::DeclStmt
            | StmtClass::IfStmt
            | StmtClass::WhileStmt
            | StmtClass::DoStmt
            | StmtClass::ForStmt
            | StmtClass::BreakStmt
            | StmtClass::ContinueStmt
            | StmtClass::ReturnStmt
            | StmtClass::LabelStmt
            | StmtClass::GotoStmt => Some(StmtClass::Stmt),
            StmtClass::CompoundAssignOperator => Some(StmtClass::BinaryOperator),
            StmtClass::ImplicitCastExpr | StmtClass::AsTypeExpr => Some(StmtClass::CastExpr),
            _ => Some(StmtClass::Expr),
        }
    }

    /// Walks the fallback chain up to its root.
    pub fn root(&self) -> StmtClass {
        let mut class = *self;
        while let Some(base) = class.base() {
            class = base;
        }
        class
    }

    pub fn derives_from(&self, ancestor: StmtClass) -> bool {
        let mut class = Some(*self);
        while let Some(current) = class {
            if current == ancestor {
                return true;
            }
            class = current.base();
        }
        false
    }

    pub fn is_expr(&self) -> bool {
        self.root() == StmtClass::Expr
    }

    pub fn is_cast(&self) -> bool {
        self.derives_from(StmtClass::CastExpr)
    }
}

impl Display for StmtClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LAnd,
    LOr,
    Assign,
    MulAssign,
    DivAssign,
    RemAssign,
    AddAssign,
    SubAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
}

impl BinaryOperator {
    pub fn from_token(kind: TokenKind) -> Option<BinaryOperator> {
        let op = match kind {
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Rem,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Dash => BinaryOperator::Sub,
            TokenKind::ShiftLeft => BinaryOperator::Shl,
            TokenKind::ShiftRight => BinaryOperator::Shr,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::LessEquals => BinaryOperator::Le,
            TokenKind::GreaterEquals => BinaryOperator::Ge,
            TokenKind::Equals => BinaryOperator::Eq,
            TokenKind::NotEquals => BinaryOperator::Ne,
            TokenKind::BitAnd => BinaryOperator::BitAnd,
            TokenKind::Caret => BinaryOperator::BitXor,
            TokenKind::BitOr => BinaryOperator::BitOr,
            TokenKind::And => BinaryOperator::LAnd,
            TokenKind::Or => BinaryOperator::LOr,
            TokenKind::Assignment => BinaryOperator::Assign,
            TokenKind::StarEquals => BinaryOperator::MulAssign,
            TokenKind::SlashEquals => BinaryOperator::DivAssign,
            TokenKind::PercentEquals => BinaryOperator::RemAssign,
            TokenKind::PlusEquals => BinaryOperator::AddAssign,
            TokenKind::MinusEquals => BinaryOperator::SubAssign,
            TokenKind::ShiftLeftEquals => BinaryOperator::ShlAssign,
            TokenKind::ShiftRightEquals => BinaryOperator::ShrAssign,
            TokenKind::AndEquals => BinaryOperator::AndAssign,
            TokenKind::CaretEquals => BinaryOperator::XorAssign,
            TokenKind::OrEquals => BinaryOperator::OrAssign,
            _ => return None,
        };
        Some(op)
    }

    pub fn spelling(&self) -> &'static str {
        match self {
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitOr => "|",
            BinaryOperator::LAnd => "&&",
            BinaryOperator::LOr => "||",
            BinaryOperator::Assign => "=",
            BinaryOperator::MulAssign => "*=",
            BinaryOperator::DivAssign => "/=",
            BinaryOperator::RemAssign => "%=",
            BinaryOperator::AddAssign => "+=",
            BinaryOperator::SubAssign => "-=",
            BinaryOperator::ShlAssign => "<<=",
            BinaryOperator::ShrAssign => ">>=",
            BinaryOperator::AndAssign => "&=",
            BinaryOperator::XorAssign => "^=",
            BinaryOperator::OrAssign => "|=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Le
                | BinaryOperator::Ge
                | BinaryOperator::Eq
                | BinaryOperator::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::LAnd | BinaryOperator::LOr)
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOperator::Shl | BinaryOperator::Shr)
    }

    /// Operators only defined on integers.
    pub fn is_integer_only(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Rem
                | BinaryOperator::Shl
                | BinaryOperator::Shr
                | BinaryOperator::BitAnd
                | BinaryOperator::BitXor
                | BinaryOperator::BitOr
        )
    }

    pub fn is_assignment(&self) -> bool {
        *self == BinaryOperator::Assign || self.is_compound_assignment()
    }

    pub fn is_compound_assignment(&self) -> bool {
        self.compound_base().is_some()
    }

    /// `+=` -> `+`, and so on.
    pub fn compound_base(&self) -> Option<BinaryOperator> {
        let op = match self {
            BinaryOperator::MulAssign => BinaryOperator::Mul,
            BinaryOperator::DivAssign => BinaryOperator::Div,
            BinaryOperator::RemAssign => BinaryOperator::Rem,
            BinaryOperator::AddAssign => BinaryOperator::Add,
            BinaryOperator::SubAssign => BinaryOperator::Sub,
            BinaryOperator::ShlAssign => BinaryOperator::Shl,
            BinaryOperator::ShrAssign => BinaryOperator::Shr,
            BinaryOperator::AndAssign => BinaryOperator::BitAnd,
            BinaryOperator::XorAssign => BinaryOperator::BitXor,
            BinaryOperator::OrAssign => BinaryOperator::BitOr,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOperator {
    pub fn from_prefix_token(kind: TokenKind) -> Option<UnaryOperator> {
        match kind {
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Dash => Some(UnaryOperator::Minus),
            TokenKind::Not => Some(UnaryOperator::Not),
            TokenKind::Tilde => Some(UnaryOperator::BitNot),
            TokenKind::PlusPlus => Some(UnaryOperator::PreInc),
            TokenKind::MinusMinus => Some(UnaryOperator::PreDec),
            _ => None,
        }
    }

    pub fn from_postfix_token(kind: TokenKind) -> Option<UnaryOperator> {
        match kind {
            TokenKind::PlusPlus => Some(UnaryOperator::PostInc),
            TokenKind::MinusMinus => Some(UnaryOperator::PostDec),
            _ => None,
        }
    }

    pub fn spelling(&self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
            UnaryOperator::PreInc | UnaryOperator::PostInc => "++",
            UnaryOperator::PreDec | UnaryOperator::PostDec => "--",
        }
    }

    pub fn is_increment_decrement(&self) -> bool {
        matches!(
            self,
            UnaryOperator::PreInc
                | UnaryOperator::PreDec
                | UnaryOperator::PostInc
                | UnaryOperator::PostDec
        )
    }

    pub fn is_postfix(&self) -> bool {
        matches!(self, UnaryOperator::PostInc | UnaryOperator::PostDec)
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    NoOp,
    IntegralCast,
    FloatingCast,
    IntegralToFloating,
    FloatingToIntegral,
    IntegralToBoolean,
    FloatingToBoolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    RValue,
    /// Names storage but may not be assigned, like a `const` binding.
    LValue,
    ModifiableLValue,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinaryOperator,
    pub lhs: ExprPtr,
    pub rhs: ExprPtr,
}

/// `lhs op= rhs`. The operation is carried out in `computation_type`, and
/// the result is converted back to the type of `lhs`.
#[derive(Debug, Clone)]
pub struct CompoundAssignExpr {
    pub op: BinaryOperator,
    pub lhs: ExprPtr,
    pub rhs: ExprPtr,
    pub computation_type: TypeId,
}

#[derive(Debug, Clone)]
pub struct CastExpr {
    pub kind: CastKind,
    pub operand: ExprPtr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntegerLiteral(i64),
    FloatingLiteral(f64),
    BoolLiteral(bool),
    CharLiteral(u8),
    StringLiteral(Rc<str>),
    DeclRef(DeclId),
    /// A name that found several overloads; only a call can pick one.
    OverloadSet(Rc<[DeclId]>),
    Paren(ExprPtr),
    Unary {
        op: UnaryOperator,
        operand: ExprPtr,
    },
    Binary(BinaryExpr),
    CompoundAssign(CompoundAssignExpr),
    Call {
        callee: DeclId,
        args: Vec<ExprPtr>,
    },
    Member {
        base: ExprPtr,
        field: DeclId,
        index: usize,
    },
    ArraySubscript {
        base: ExprPtr,
        index: ExprPtr,
    },
    Conditional {
        cond: ExprPtr,
        then_expr: ExprPtr,
        else_expr: ExprPtr,
    },
    ImplicitCast(CastExpr),
    AsType(CastExpr),
    /// Stands in for an expression Sema rejected. Its type is unresolved so
    /// later checks stay quiet instead of cascading.
    Recovery(Vec<ExprPtr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
    pub value_kind: ValueKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeId, value_kind: ValueKind, span: Span) -> ExprPtr {
        Rc::new(Expr {
            kind,
            ty,
            value_kind,
            span,
        })
    }

    pub fn rvalue(kind: ExprKind, ty: TypeId, span: Span) -> ExprPtr {
        Expr::new(kind, ty, ValueKind::RValue, span)
    }

    pub fn class(&self) -> StmtClass {
        match &self.kind {
            ExprKind::IntegerLiteral(_) => StmtClass::IntegerLiteral,
            ExprKind::FloatingLiteral(_) => StmtClass::FloatingLiteral,
            ExprKind::BoolLiteral(_) => StmtClass::BoolLiteral,
            ExprKind::CharLiteral(_) => StmtClass::CharLiteral,
            ExprKind::StringLiteral(_) => StmtClass::StringLiteral,
            ExprKind::DeclRef(_) => StmtClass::DeclRefExpr,
            ExprKind::OverloadSet(_) => StmtClass::OverloadSetExpr,
            ExprKind::Paren(_) => StmtClass::ParenExpr,
            ExprKind::Unary { .. } => StmtClass::UnaryOperator,
            ExprKind::Binary(_) => StmtClass::BinaryOperator,
            ExprKind::CompoundAssign(_) => StmtClass::CompoundAssignOperator,
            ExprKind::Call { .. } => StmtClass::CallExpr,
            ExprKind::Member { .. } => StmtClass::MemberExpr,
            ExprKind::ArraySubscript { .. } => StmtClass::ArraySubscriptExpr,
            ExprKind::Conditional { .. } => StmtClass::ConditionalOperator,
            ExprKind::ImplicitCast(_) => StmtClass::ImplicitCastExpr,
            ExprKind::AsType(_) => StmtClass::AsTypeExpr,
            ExprKind::Recovery(_) => StmtClass::RecoveryExpr,
        }
    }

    pub fn is_lvalue(&self) -> bool {
        self.value_kind != ValueKind::RValue
    }

    pub fn is_modifiable_lvalue(&self) -> bool {
        self.value_kind == ValueKind::ModifiableLValue
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self.kind, ExprKind::Recovery(_))
    }

    /// Skips any number of parentheses.
    pub fn ignore_parens(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.ignore_parens(),
            _ => self,
        }
    }

    pub fn as_cast(&self) -> Option<&CastExpr> {
        match &self.kind {
            ExprKind::ImplicitCast(cast) | ExprKind::AsType(cast) => Some(cast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Null,
    Compound(Vec<StmtPtr>),
    Decl(Vec<DeclId>),
    /// An expression evaluated for its effects.
    Expr(ExprPtr),
    If {
        cond: ExprPtr,
        then_stmt: StmtPtr,
        else_stmt: Option<StmtPtr>,
    },
    While {
        cond: ExprPtr,
        body: StmtPtr,
    },
    Do {
        body: StmtPtr,
        cond: ExprPtr,
    },
    For {
        init: Option<StmtPtr>,
        cond: Option<ExprPtr>,
        inc: Option<ExprPtr>,
        body: StmtPtr,
    },
    Break,
    Continue,
    Return(Option<ExprPtr>),
    Label {
        label: DeclId,
        sub_stmt: StmtPtr,
    },
    Goto(DeclId),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> StmtPtr {
        Rc::new(Stmt { kind, span })
    }

    /// Expression statements report the class of their expression.
    pub fn class(&self) -> StmtClass {
        match &self.kind {
            StmtKind::Null => StmtClass::NullStmt,
            StmtKind::Compound(_) => StmtClass::CompoundStmt,
            StmtKind::Decl(_) => StmtClass::DeclStmt,
            StmtKind::Expr(expr) => expr.class(),
            StmtKind::If { .. } => StmtClass::IfStmt,
            StmtKind::While { .. } => StmtClass::WhileStmt,
            StmtKind::Do { .. } => StmtClass::DoStmt,
            StmtKind::For { .. } => StmtClass::ForStmt,
            StmtKind::Break => StmtClass::BreakStmt,
            StmtKind::Continue => StmtClass::ContinueStmt,
            StmtKind::Return(_) => StmtClass::ReturnStmt,
            StmtKind::Label { .. } => StmtClass::LabelStmt,
            StmtKind::Goto(_) => StmtClass::GotoStmt,
        }
    }

    /// Whether control can reach the end of this statement. Conservative:
    /// loops are assumed to exit.
    pub fn can_fall_through(&self) -> bool {
        match &self.kind {
            StmtKind::Return(_) => false,
            StmtKind::Goto(_) => false,
            StmtKind::Compound(body) => body.last().map_or(true, |last| last.can_fall_through()),
            StmtKind::If {
                then_stmt,
                else_stmt: Some(else_stmt),
                ..
            } => then_stmt.can_fall_through() || else_stmt.can_fall_through(),
            StmtKind::Label { sub_stmt, .. } => sub_stmt.can_fall_through(),
            _ => true,
        }
    }
}
