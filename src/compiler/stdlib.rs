//! Runtime support functions.
//!
//! Compiled programs print through a small C runtime linked next to the
//! generated module. Its functions are declared into the translation unit
//! before any source is analysed, the same way the interpreter registers
//! its host functions, so both backends accept the same programs.

use log::debug;

use crate::{ast::types::BuiltinClass, errors::errors::Error, sema::sema::Sema};

/// Name, result class and parameter classes of every runtime function.
pub const RUNTIME_FUNCTIONS: [(&str, BuiltinClass, &[BuiltinClass]); 3] = [
    ("print_int", BuiltinClass::Void, &[BuiltinClass::I64]),
    ("print_float", BuiltinClass::Void, &[BuiltinClass::F64]),
    ("print_char", BuiltinClass::Void, &[BuiltinClass::Char]),
];

/// Declares the runtime functions in the translation unit of `sema`.
///
/// # Arguments
///
/// * `sema` - The semantic analyser code will be compiled with
///
/// # Returns
///
/// An error if a runtime function clashes with an existing declaration.
pub fn declare_runtime(sema: &mut Sema) -> Result<(), Error> {
    for (name, result, params) in RUNTIME_FUNCTIONS {
        let result = sema.ast.get_builtin_type(result);
        let params: Vec<_> = params
            .iter()
            .map(|class| sema.ast.get_builtin_type(*class))
            .collect();
        sema.declare_intrinsic(name, result, &params)?;
    }

    debug!("codegen: declared {} runtime function(s)", RUNTIME_FUNCTIONS.len());
    Ok(())
}
