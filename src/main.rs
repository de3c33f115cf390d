use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use procyon::{
    compiler::compiler::Compiler,
    display_error,
    errors::errors::Error,
    interpreter::{interpreter::Interpreter, value::Value},
    options::CompilerOptions,
};

/// Interpreter and compiler for the procyon language
#[derive(Parser)]
#[command(name = "procyon")]
#[command(version = "0.1.0")]
#[command(about = "Procyon language interpreter and compiler", long_about = None)]
struct Cli {
    /// Print debug traces
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Replace the builtin diagnostic texts
    #[arg(long, value_name = "FILE", global = true)]
    diag_texts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Function to call once the file is analysed
        #[arg(long, default_value = "main")]
        entry: String,
    },
    /// Read statements from stdin and run each one as it is entered
    Repl {
        /// Do not print the value of expression statements
        #[arg(long)]
        quiet: bool,
    },
    /// Compile a source file to IR
    Compile {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path; defaults to the input with an .ir or .ll extension
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Emit LLVM IR through inkwell
        #[arg(long)]
        emit_llvm: bool,

        /// Log the lowered module
        #[arg(long)]
        dump_ir: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .format_timestamp(None)
        .init();

    let mut options = CompilerOptions {
        diag_text_path: cli.diag_texts.clone(),
        ..CompilerOptions::default()
    };

    match cli.command {
        Commands::Run { file, entry } => {
            options.entry_function = entry;
            run(file, options)
        }
        Commands::Repl { quiet } => {
            options.repl_echo = !quiet;
            repl(options)
        }
        Commands::Compile {
            file,
            output,
            emit_llvm,
            dump_ir,
        } => {
            options.dump_ir = dump_ir;
            compile(file, output, emit_llvm, options)
        }
    }
}

/// Reports an error raised before any source was loaded.
fn report_setup_error(error: &Error) -> ExitCode {
    eprintln!("Error: {} ({})", error.get_error_name(), error);
    ExitCode::FAILURE
}

fn run(file: PathBuf, options: CompilerOptions) -> ExitCode {
    let mut interpreter = match Interpreter::new(options) {
        Ok(interpreter) => interpreter,
        Err(error) => return report_setup_error(&error),
    };

    let start = Instant::now();
    let result = interpreter.run_file(&file);
    info!("Ran {} in {:?}", file.display(), start.elapsed());

    match result {
        // The entry function's integer result becomes the exit status
        Ok(Value::Integer(code)) => ExitCode::from(code as u8),
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            display_error(&error, &interpreter.sources().borrow());
            ExitCode::FAILURE
        }
    }
}

fn repl(options: CompilerOptions) -> ExitCode {
    let echo = options.repl_echo;
    let mut interpreter = match Interpreter::new(options) {
        Ok(interpreter) => interpreter,
        Err(error) => return report_setup_error(&error),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }

        let Some(Ok(line)) = lines.next() else {
            return ExitCode::SUCCESS;
        };
        if line.trim().is_empty() {
            continue;
        }

        match interpreter.run_statement(&line) {
            Ok(Some(value)) if echo => println!("{}", value),
            Ok(_) => {}
            Err(error) => display_error(&error, &interpreter.sources().borrow()),
        }
    }
}

fn compile(file: PathBuf, output: Option<PathBuf>, emit_llvm: bool, options: CompilerOptions) -> ExitCode {
    let mut compiler = match Compiler::new(options) {
        Ok(compiler) => compiler,
        Err(error) => return report_setup_error(&error),
    };

    let start = Instant::now();
    match compiler.compile_file(&file, output.as_deref(), emit_llvm) {
        Ok(written) => {
            info!("Compiled in {:?}", start.elapsed());
            println!("{}", written.display());
            ExitCode::SUCCESS
        }
        Err(error) => {
            display_error(&error, &compiler.sources().borrow());
            ExitCode::FAILURE
        }
    }
}
