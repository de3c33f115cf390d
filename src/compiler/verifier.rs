use crate::{
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::ir::{BlockId, Function, IrType, InstKind, Module, Terminator};

/// Checks the structural rules a backend relies on before a module is
/// handed over.
///
/// For every defined function:
/// - each block ends in exactly one terminator
/// - branches target blocks of the same function
/// - every block other than the entry has a predecessor
/// - `ret` agrees with the declared result type
/// - phi entries come from predecessors of their block
///
/// Calls must name a function of the module and pass as many arguments as
/// it declares (at least as many when it is variadic).
pub fn verify_module(module: &Module) -> Result<(), Error> {
    for function in &module.functions {
        if !function.is_declaration() {
            verify_function(module, function)?;
        }
    }
    Ok(())
}

fn failure(function: &Function, message: String) -> Error {
    Error::new(
        ErrorImpl::VerificationFailed {
            function: function.name.clone(),
            message,
        },
        Position::null(),
    )
}

fn verify_function(module: &Module, function: &Function) -> Result<(), Error> {
    let block_count = function.blocks.len();
    let in_range = |id: &BlockId| id.0 < block_count;

    for (index, block) in function.blocks.iter().enumerate() {
        let Some(terminator) = &block.terminator else {
            return Err(failure(function, format!("block `{}` has no terminator", block.name)));
        };

        if let Some(target) = terminator.successors().iter().find(|target| !in_range(target)) {
            return Err(failure(
                function,
                format!("block `{}` branches to missing block #{}", block.name, target.0),
            ));
        }

        match terminator {
            Terminator::Ret(None) if function.result != IrType::Void => {
                return Err(failure(function, format!("block `{}` returns no value", block.name)));
            }
            Terminator::Ret(Some(value)) if value.ty != function.result => {
                return Err(failure(
                    function,
                    format!(
                        "block `{}` returns {} from a function returning {}",
                        block.name, value.ty, function.result
                    ),
                ));
            }
            _ => {}
        }

        let predecessors = function.predecessors(BlockId(index));
        if index > 0 && predecessors.is_empty() {
            return Err(failure(function, format!("block `{}` is unreachable", block.name)));
        }

        for instruction in &block.instructions {
            match &instruction.kind {
                InstKind::Call { callee, args } => verify_call(module, function, callee, args.len())?,
                InstKind::Phi(incoming) => {
                    if let Some((_, from)) = incoming
                        .iter()
                        .find(|(_, from)| !in_range(from) || !predecessors.contains(from))
                    {
                        return Err(failure(
                            function,
                            format!("phi in `{}` names block #{} which is not a predecessor", block.name, from.0),
                        ));
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn verify_call(module: &Module, function: &Function, callee: &str, args: usize) -> Result<(), Error> {
    let Some(target) = module.get_function(callee) else {
        return Err(failure(function, format!("call to unknown function `{}`", callee)));
    };

    let expected = target.params.len();
    let matches = if target.variadic {
        args >= expected
    } else {
        args == expected
    };
    if !matches {
        return Err(failure(
            function,
            format!("`{}` expects {} argument(s), got {}", callee, expected, args),
        ));
    }
    Ok(())
}
