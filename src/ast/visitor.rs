//! Tag-dispatched traversal shared by the interpreter and the code generator.
//!
//! [`StmtVisitor::visit`] and [`StmtVisitor::visit_expression`] switch on the
//! node class and call the matching `visit_*` method. Every `visit_*` method
//! has a default body that forwards to the method of its base class (see
//! [`StmtClass::base`]), so a visitor only overrides what it cares about and
//! must provide the two roots, [`StmtVisitor::visit_stmt`] and
//! [`StmtVisitor::visit_expr`].
//!
//! Visitors never mutate the tree. Expression results go through the slot
//! returned by [`StmtVisitor::last_value`]; [`StmtVisitor::evaluate`] visits
//! a subexpression and takes its value out of the slot.

use crate::errors::errors::Error;

use super::stmts::{Expr, Stmt, StmtClass, StmtKind};

pub trait StmtVisitor {
    type Value;

    /// The "last visited value" slot. Expression visits leave their result
    /// here.
    fn last_value(&mut self) -> &mut Option<Self::Value>;

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), Error>;
    fn visit_expr(&mut self, expr: &Expr) -> Result<(), Error>;

    fn visit(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt.class() {
            StmtClass::NullStmt => self.visit_null_stmt(stmt),
            StmtClass::CompoundStmt => self.visit_compound_stmt(stmt),
            StmtClass::DeclStmt => self.visit_decl_stmt(stmt),
            StmtClass::IfStmt => self.visit_if_stmt(stmt),
            StmtClass::WhileStmt => self.visit_while_stmt(stmt),
            StmtClass::DoStmt => self.visit_do_stmt(stmt),
            StmtClass::ForStmt => self.visit_for_stmt(stmt),
            StmtClass::BreakStmt => self.visit_break_stmt(stmt),
            StmtClass::ContinueStmt => self.visit_continue_stmt(stmt),
            StmtClass::ReturnStmt => self.visit_return_stmt(stmt),
            StmtClass::LabelStmt => self.visit_label_stmt(stmt),
            StmtClass::GotoStmt => self.visit_goto_stmt(stmt),
            class if class.is_expr() => match &stmt.kind {
                StmtKind::Expr(expr) => self.visit_expression(expr),
                _ => Err(Error::invariant(format!(
                    "statement tagged as expression class {}",
                    class
                ))),
            },
            _ => self.visit_stmt(stmt),
        }
    }

    fn visit_expression(&mut self, expr: &Expr) -> Result<(), Error> {
        match expr.class() {
            StmtClass::IntegerLiteral => self.visit_integer_literal(expr),
            StmtClass::FloatingLiteral => self.visit_floating_literal(expr),
            StmtClass::BoolLiteral => self.visit_bool_literal(expr),
            StmtClass::CharLiteral => self.visit_char_literal(expr),
            StmtClass::StringLiteral => self.visit_string_literal(expr),
            StmtClass::DeclRefExpr => self.visit_decl_ref_expr(expr),
            StmtClass::OverloadSetExpr => self.visit_overload_set_expr(expr),
            StmtClass::ParenExpr => self.visit_paren_expr(expr),
            StmtClass::UnaryOperator => self.visit_unary_operator(expr),
            StmtClass::BinaryOperator => self.visit_binary_operator(expr),
            StmtClass::CompoundAssignOperator => self.visit_compound_assign_operator(expr),
            StmtClass::CallExpr => self.visit_call_expr(expr),
            StmtClass::MemberExpr => self.visit_member_expr(expr),
            StmtClass::ArraySubscriptExpr => self.visit_array_subscript_expr(expr),
            StmtClass::ConditionalOperator => self.visit_conditional_operator(expr),
            StmtClass::ImplicitCastExpr => self.visit_implicit_cast_expr(expr),
            StmtClass::AsTypeExpr => self.visit_as_type_expr(expr),
            StmtClass::RecoveryExpr => self.visit_recovery_expr(expr),
            // Structural fallback for abstract classes
            class if class.is_cast() => self.visit_cast_expr(expr),
            _ => self.visit_expr(expr),
        }
    }

    /// Visits `expr` and takes its value out of the slot.
    fn evaluate(&mut self, expr: &Expr) -> Result<Self::Value, Error> {
        *self.last_value() = None;
        self.visit_expression(expr)?;
        self.last_value().take().ok_or_else(|| {
            Error::invariant(format!("visiting {} produced no value", expr.class()))
        })
    }

    // Statements

    fn visit_null_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_compound_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_decl_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_do_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_for_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_break_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_continue_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_label_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    fn visit_goto_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        self.visit_stmt(stmt)
    }

    // Expressions

    fn visit_integer_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_floating_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_bool_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_char_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_string_literal(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_decl_ref_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_overload_set_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_paren_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_unary_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_binary_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_compound_assign_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_binary_operator(expr)
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_member_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_array_subscript_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_conditional_operator(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_cast_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }

    fn visit_implicit_cast_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_cast_expr(expr)
    }

    fn visit_as_type_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_cast_expr(expr)
    }

    fn visit_recovery_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.visit_expr(expr)
    }
}
