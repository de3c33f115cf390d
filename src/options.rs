//! Configuration shared by the interpreter, the compiler and the CLI.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Function called by `run` once the file has been analysed.
    pub entry_function: String,
    /// Replaces the builtin diagnostic texts when set.
    pub diag_text_path: Option<PathBuf>,
    /// Print the lowered IR module after a successful compile.
    pub dump_ir: bool,
    /// Upper bound on nested declarator resolutions before giving up.
    pub max_resolution_depth: usize,
    /// Upper bound on interpreter call frames.
    pub max_call_depth: usize,
    /// Print the value of expression statements in the REPL.
    pub repl_echo: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            entry_function: String::from("main"),
            diag_text_path: None,
            dump_ir: false,
            max_resolution_depth: 256,
            max_call_depth: 1024,
            repl_echo: true,
        }
    }
}
