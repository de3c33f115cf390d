use crate::{
    ast::{
        decls::DeclKind,
        stmts::{Stmt, StmtKind},
        visitor::StmtVisitor,
    },
    errors::errors::{Error, ErrorImpl},
};

use super::{
    compiler::{CodeGen, LoopTargets},
    expr::gen_condition,
    ir::{IrType, Operand, Terminator},
};

pub fn gen_compound_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::Compound(stmts) = &stmt.kind else {
        return Err(Error::invariant("compound statement without a body"));
    };
    for stmt in stmts {
        codegen.visit(stmt)?;
    }
    Ok(())
}

/// Gives every local variable a stack slot and stores its initial value.
/// Other block-scope declarations produce no code.
pub fn gen_decl_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::Decl(decls) = &stmt.kind else {
        return Err(Error::invariant("declaration statement without declarations"));
    };

    let ast = codegen.ast;
    for decl in decls {
        let var = ast.get_decl(*decl);
        if var.kind != DeclKind::Var {
            continue;
        }

        let position = var.span.start.clone();
        let Some(ty) = var.ty else {
            return Err(Error::new(
                ErrorImpl::UnresolvedType {
                    type_: var.name_str().to_string(),
                },
                position,
            ));
        };
        let ty = codegen.lower_type(ty, &position)?;

        let value = match var.init() {
            Some(init) => codegen.evaluate(init)?,
            None => Operand::zero(ty.clone()),
        };
        let slot = codegen.emit_alloca(ty)?;
        codegen.emit_store(value, slot.clone())?;
        codegen.bind_local(*decl, slot);
    }
    Ok(())
}

/// Lowers to `if.then`, an optional `if.else` and the `if.end` join
/// block. Without an else branch the false edge goes straight to `if.end`.
pub fn gen_if_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::If {
        cond,
        then_stmt,
        else_stmt,
    } = &stmt.kind
    else {
        return Err(Error::invariant("malformed if statement"));
    };

    let cond = gen_condition(codegen, cond)?;
    let then_block = codegen.append_block("if.then")?;
    let else_block = match else_stmt {
        Some(_) => Some(codegen.append_block("if.else")?),
        None => None,
    };
    let end_block = codegen.append_block("if.end")?;

    codegen.terminate(Terminator::CondBr {
        cond,
        then_block,
        else_block: else_block.unwrap_or(end_block),
    })?;

    codegen.position_at_end(then_block);
    codegen.visit(then_stmt)?;
    codegen.emit_branch(end_block)?;

    if let (Some(else_block), Some(else_stmt)) = (else_block, else_stmt) {
        codegen.position_at_end(else_block);
        codegen.visit(else_stmt)?;
        codegen.emit_branch(end_block)?;
    }

    codegen.position_at_end(end_block);
    Ok(())
}

pub fn gen_while_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::While { cond, body } = &stmt.kind else {
        return Err(Error::invariant("malformed while statement"));
    };

    let cond_block = codegen.append_block("while.cond")?;
    let body_block = codegen.append_block("while.body")?;
    let end_block = codegen.append_block("while.end")?;

    codegen.emit_branch(cond_block)?;
    codegen.position_at_end(cond_block);
    let cond = gen_condition(codegen, cond)?;
    codegen.terminate(Terminator::CondBr {
        cond,
        then_block: body_block,
        else_block: end_block,
    })?;

    codegen.position_at_end(body_block);
    codegen.push_loop(LoopTargets {
        break_block: end_block,
        continue_block: cond_block,
    });
    codegen.visit(body)?;
    codegen.pop_loop();
    codegen.emit_branch(cond_block)?;

    codegen.position_at_end(end_block);
    Ok(())
}

pub fn gen_do_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::Do { body, cond } = &stmt.kind else {
        return Err(Error::invariant("malformed do statement"));
    };

    let body_block = codegen.append_block("do.body")?;
    let cond_block = codegen.append_block("do.cond")?;
    let end_block = codegen.append_block("do.end")?;

    codegen.emit_branch(body_block)?;
    codegen.position_at_end(body_block);
    codegen.push_loop(LoopTargets {
        break_block: end_block,
        continue_block: cond_block,
    });
    codegen.visit(body)?;
    codegen.pop_loop();
    codegen.emit_branch(cond_block)?;

    codegen.position_at_end(cond_block);
    let cond = gen_condition(codegen, cond)?;
    codegen.terminate(Terminator::CondBr {
        cond,
        then_block: body_block,
        else_block: end_block,
    })?;

    codegen.position_at_end(end_block);
    Ok(())
}

/// `continue` goes to `for.inc`. A missing condition loops unconditionally.
pub fn gen_for_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::For {
        init,
        cond,
        inc,
        body,
    } = &stmt.kind
    else {
        return Err(Error::invariant("malformed for statement"));
    };

    if let Some(init) = init {
        codegen.visit(init)?;
    }

    let cond_block = codegen.append_block("for.cond")?;
    let body_block = codegen.append_block("for.body")?;
    let inc_block = codegen.append_block("for.inc")?;
    let end_block = codegen.append_block("for.end")?;

    codegen.emit_branch(cond_block)?;
    codegen.position_at_end(cond_block);
    match cond {
        Some(cond) => {
            let cond = gen_condition(codegen, cond)?;
            codegen.terminate(Terminator::CondBr {
                cond,
                then_block: body_block,
                else_block: end_block,
            })?;
        }
        None => codegen.emit_branch(body_block)?,
    }

    codegen.position_at_end(body_block);
    codegen.push_loop(LoopTargets {
        break_block: end_block,
        continue_block: inc_block,
    });
    codegen.visit(body)?;
    codegen.pop_loop();
    codegen.emit_branch(inc_block)?;

    codegen.position_at_end(inc_block);
    if let Some(inc) = inc {
        codegen.evaluate(inc)?;
    }
    codegen.emit_branch(cond_block)?;

    codegen.position_at_end(end_block);
    Ok(())
}

/// `break`, `continue` and `goto`.
pub fn gen_jump_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let target = match &stmt.kind {
        StmtKind::Goto(label) => codegen.label_block(*label)?,
        StmtKind::Break | StmtKind::Continue => {
            let targets = codegen
                .loop_targets()
                .ok_or_else(|| Error::invariant(format!("{} outside of a loop", stmt.class())))?;
            match stmt.kind {
                StmtKind::Break => targets.break_block,
                _ => targets.continue_block,
            }
        }
        _ => return Err(Error::invariant("malformed jump statement")),
    };
    codegen.emit_branch(target)
}

pub fn gen_return_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::Return(value) = &stmt.kind else {
        return Err(Error::invariant("malformed return statement"));
    };

    // A void call may be returned from a void function
    let value = match value {
        Some(value) => Some(codegen.evaluate(value)?),
        None => None,
    };
    let terminator = match (value, codegen.current_function()?.result.clone()) {
        (_, IrType::Void) => Terminator::Ret(None),
        (Some(value), _) => Terminator::Ret(Some(value)),
        (None, result) => Terminator::Ret(Some(Operand::zero(result))),
    };
    codegen.terminate(terminator)
}

/// Falls through into the label's block, which earlier `goto`s may already
/// target.
pub fn gen_label_stmt(codegen: &mut CodeGen, stmt: &Stmt) -> Result<(), Error> {
    let StmtKind::Label { label, sub_stmt } = &stmt.kind else {
        return Err(Error::invariant("malformed label statement"));
    };

    let block = codegen.label_block(*label)?;
    codegen.emit_branch(block)?;
    codegen.position_at_end(block);
    codegen.visit(sub_stmt)
}
