// File: src/main.rs
//
// Command-line runner for RookScript.
// Compiles a script file with the common host functions registered and
// either runs an entry point or prints the disassembly.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;

use rookscript::builder::ScriptInstanceBuilder;
use rookscript::bytecode::Script;
use rookscript::instance::ScriptInstanceState;
use rookscript::resolver::HostFunctionResolver;
use rookscript::stdlib::CommonFunction;
use rookscript::value::Value;

#[derive(ClapParser)]
#[command(
    name = "rookscript",
    about = "RookScript: an embeddable scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Compile and run a script file
    Run {
        /// Path to the script file
        file: PathBuf,

        /// Entry point to call
        #[arg(long, default_value = "main")]
        entry: String,

        /// Maximum commands per update before the script is halted
        #[arg(long)]
        runaway_limit: Option<u64>,

        /// Print the compiled bytecode before running
        #[arg(long)]
        disassemble: bool,

        /// Arguments passed to the entry point
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        script_args: Vec<String>,
    },

    /// Compile a script file and print its bytecode
    Disasm {
        /// Path to the script file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { file, entry, runaway_limit, disassemble, script_args } => {
            run(file, entry, runaway_limit.unwrap_or(0), disassemble, script_args)
        }
        Commands::Disasm { file } => match compile_file(&file) {
            Ok(script) => {
                print!("{}", script.disassemble_to_string());
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },
    }
}

fn compile_file(path: &PathBuf) -> Result<Script, ExitCode> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            fail(&format!("cannot read {}: {}", path.display(), err));
            return Err(ExitCode::from(2));
        }
    };
    let resolver: Arc<dyn HostFunctionResolver> = Arc::new(CommonFunction::registry());
    match rookscript::compile(&source, Some(resolver)) {
        Ok(script) => Ok(script),
        Err(err) => {
            fail(&err.to_string());
            Err(ExitCode::from(2))
        }
    }
}

fn run(
    file: PathBuf,
    entry: String,
    runaway_limit: u64,
    disassemble: bool,
    script_args: Vec<String>,
) -> ExitCode {
    let script = match compile_file(&file) {
        Ok(script) => script,
        Err(code) => return code,
    };
    if disassemble {
        eprint!("{}", script.disassemble_to_string());
    }

    let Some(entry_info) = script.entry(&entry) else {
        fail(&format!("entry point \"{}\" not found in {}", entry, file.display()));
        return ExitCode::from(2);
    };
    let args = match entry_arguments(entry_info.param_count, &script_args) {
        Some(args) => args,
        None => {
            fail(&format!(
                "entry point \"{}\" takes {} parameter(s), got {}",
                entry,
                entry_info.param_count,
                script_args.len()
            ));
            return ExitCode::from(2);
        }
    };

    let mut instance = match ScriptInstanceBuilder::new()
        .with_script(Arc::new(script))
        .with_common_functions()
        .with_runaway_limit(runaway_limit)
        .create_instance()
    {
        Ok(instance) => instance,
        Err(err) => {
            fail(&err.to_string());
            return ExitCode::from(2);
        }
    };

    if let Err(err) = instance.call(&entry, &args) {
        fail(&err.to_string());
        return ExitCode::from(3);
    }
    match instance.state() {
        ScriptInstanceState::Ended => match instance.pop_stack_value() {
            // An integer return becomes the process exit code.
            Ok(Value::Integer(code)) => ExitCode::from((code & 0xFF) as u8),
            _ => ExitCode::SUCCESS,
        },
        state => {
            fail(&format!(
                "script stopped in state \"{}\" (no wait handler is installed)",
                state.name()
            ));
            ExitCode::from(4)
        }
    }
}

// Script args map onto the entry: one string per parameter, or a single
// list parameter taking all of them.
fn entry_arguments(param_count: usize, script_args: &[String]) -> Option<Vec<Value>> {
    if param_count == script_args.len() {
        Some(script_args.iter().map(Value::string).collect())
    } else if param_count == 1 {
        Some(vec![Value::list_of(script_args.iter().map(Value::string).collect())])
    } else if param_count == 0 {
        Some(Vec::new())
    } else {
        None
    }
}

fn fail(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}
