use crate::{
    ast::{
        decls::{DeclData, DeclId},
        stmts::{ExprPtr, Stmt, StmtKind, StmtPtr},
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::Error,
    Span,
};

use super::{scope::ScopeFlags, sema::Sema};

impl Sema {
    pub fn act_on_null_stmt(&mut self, span: &Span) -> StmtPtr {
        Stmt::new(StmtKind::Null, span.clone())
    }

    pub fn act_on_compound_stmt(&mut self, stmts: Vec<StmtPtr>, span: &Span) -> StmtPtr {
        Stmt::new(StmtKind::Compound(stmts), span.clone())
    }

    pub fn act_on_decl_stmt(&mut self, decls: Vec<DeclId>, span: &Span) -> StmtPtr {
        Stmt::new(StmtKind::Decl(decls), span.clone())
    }

    pub fn act_on_expr_stmt(&mut self, expr: ExprPtr) -> StmtPtr {
        let span = expr.span.clone();
        Stmt::new(StmtKind::Expr(expr), span)
    }

    pub fn act_on_if_stmt(
        &mut self,
        cond: ExprPtr,
        then_stmt: StmtPtr,
        else_stmt: Option<StmtPtr>,
        span: &Span,
    ) -> StmtPtr {
        let cond = self.act_on_condition_expr(cond);
        Stmt::new(
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            },
            span.clone(),
        )
    }

    /// The parser opens a break/continue scope around loop bodies before
    /// analysing them.
    pub fn act_on_while_stmt(&mut self, cond: ExprPtr, body: StmtPtr, span: &Span) -> StmtPtr {
        let cond = self.act_on_condition_expr(cond);
        Stmt::new(StmtKind::While { cond, body }, span.clone())
    }

    pub fn act_on_do_stmt(&mut self, body: StmtPtr, cond: ExprPtr, span: &Span) -> StmtPtr {
        let cond = self.act_on_condition_expr(cond);
        Stmt::new(StmtKind::Do { body, cond }, span.clone())
    }

    pub fn act_on_for_stmt(
        &mut self,
        init: Option<StmtPtr>,
        cond: Option<ExprPtr>,
        inc: Option<ExprPtr>,
        body: StmtPtr,
        span: &Span,
    ) -> StmtPtr {
        let cond = cond.map(|cond| self.act_on_condition_expr(cond));
        Stmt::new(StmtKind::For { init, cond, inc, body }, span.clone())
    }

    pub fn act_on_break_stmt(&mut self, span: &Span) -> StmtPtr {
        if self.enclosing_scope_with(ScopeFlags::BREAK_SCOPE).is_none() {
            self.diag(DiagId::ErrBreakOutsideLoop, span, &[]);
            return self.act_on_null_stmt(span);
        }
        Stmt::new(StmtKind::Break, span.clone())
    }

    pub fn act_on_continue_stmt(&mut self, span: &Span) -> StmtPtr {
        if self.enclosing_scope_with(ScopeFlags::CONTINUE_SCOPE).is_none() {
            self.diag(DiagId::ErrContinueOutsideLoop, span, &[]);
            return self.act_on_null_stmt(span);
        }
        Stmt::new(StmtKind::Continue, span.clone())
    }

    /// Checks the returned value against the result type of the enclosing
    /// function and converts it.
    pub fn act_on_return_stmt(&mut self, value: Option<ExprPtr>, span: &Span) -> StmtPtr {
        let Some((function, result)) = self.functions.last().map(|info| (info.decl, info.result)) else {
            self.diag(DiagId::ErrReturnOutsideFunction, span, &[]);
            return self.act_on_null_stmt(span);
        };
        let name = self.qualified_name(function);

        let value = match value {
            Some(value) if self.ast.is_void(result) => {
                let quiet = value.is_recovery() || self.ast.is_void(value.ty);
                if !quiet {
                    self.diag(DiagId::ErrReturnValueInVoid, &value.span, &[&*name]);
                }
                Some(value)
            }
            Some(value) => Some(self.perform_implicit_conversion(value, result, span)),
            None => {
                if !self.ast.is_void(result) && !self.ast.is_unresolved(result) {
                    self.diag(DiagId::ErrReturnMissingValue, span, &[&*name]);
                }
                None
            }
        };
        Stmt::new(StmtKind::Return(value), span.clone())
    }

    /// `name: stmt`. A label may be defined once per function.
    pub fn act_on_label_stmt(&mut self, name: &str, span: &Span, sub_stmt: StmtPtr) -> Result<StmtPtr, Error> {
        let Some(label) = self.lookup_or_create_label(name, span)? else {
            return Ok(sub_stmt);
        };

        let already_defined = match &self.ast.get_decl(label).data {
            DeclData::Label { defined } => *defined,
            _ => return Err(Error::invariant(format!("label `{}` is not a label declaration", name))),
        };
        if already_defined {
            self.diag(DiagId::ErrLabelRedefinition, span, &[name]);
            return Ok(sub_stmt);
        }

        // The label now points at its definition
        let entry = self.ast.get_decl_mut(label);
        entry.data = DeclData::Label { defined: true };
        entry.span = span.clone();

        Ok(Stmt::new(StmtKind::Label { label, sub_stmt }, span.clone()))
    }

    /// `goto name;`. The label may be defined later in the function.
    pub fn act_on_goto_stmt(&mut self, name: &str, span: &Span) -> Result<StmtPtr, Error> {
        Ok(match self.lookup_or_create_label(name, span)? {
            Some(label) => Stmt::new(StmtKind::Goto(label), span.clone()),
            None => self.act_on_null_stmt(span),
        })
    }
}
