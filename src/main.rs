use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use modscript::bytecode::disasm::print_program;
use modscript::frontend::{Lexer, TokenDumper};
use modscript::{ExecConfig, Program, Registry, RegistryConfig, Vm, Worker, compile, standard_builder};

#[derive(Parser)]
#[command(name = "modscript", version, about = "Compile and run mod scripts")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run a script, printing its result
    Run {
        file: PathBuf,
        /// Input register values, in order
        #[arg(short, long = "arg", value_name = "N", allow_negative_numbers = true)]
        args: Vec<i32>,
        #[command(flatten)]
        machine: MachineArgs,
        /// Instructions a run may execute before it is stopped
        #[arg(long, default_value_t = 65_536, value_parser = clap::value_parser!(u32).range(1..))]
        max_steps: u32,
    },
    /// Show the tokens of a script
    Tokens {
        file: PathBuf,
        #[arg(long)]
        no_color: bool,
    },
    /// Compile a script and show its bytecode
    Disasm {
        file: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// List every type, constant and operation scripts can use
    Ops {
        #[command(flatten)]
        machine: MachineArgs,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// Registers available to a script
    #[arg(long, default_value_t = 64)]
    registers: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt().with_env_filter(filter).with_target(true).init();
}

fn run_command(command: Command) -> Result<(), String> {
    match command {
        Command::Run {
            file,
            args,
            machine,
            max_steps,
        } => {
            let registry = registry(&machine)?;
            let program = compile_file(&file, &registry)?;
            let config = ExecConfig::default().with_max_steps(max_steps);
            let result = Vm::with_config(config)
                .run(&program, &mut Worker::new(), &args)
                .map_err(|e| format!("Runtime error: {}", e))?;
            println!("{}", result);
        }
        Command::Tokens { file, no_color } => {
            let source = read_source(&file)?;
            let tokens = Lexer::new(&source).tokenize();
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            print!("{}", dumper.dump(&tokens));
        }
        Command::Disasm { file, machine } => {
            let registry = registry(&machine)?;
            let program = compile_file(&file, &registry)?;
            print_program(&program);
        }
        Command::Ops { machine } => {
            print!("{}", registry(&machine)?.describe());
        }
    }
    Ok(())
}

fn registry(machine: &MachineArgs) -> Result<Registry, String> {
    let config = RegistryConfig::default().with_registers(machine.registers);
    standard_builder(config)
        .map(|b| b.build())
        .map_err(|e| format!("Invalid configuration: {}", e))
}

fn read_source(file: &Path) -> Result<String, String> {
    fs::read_to_string(file).map_err(|e| format!("Failed to read '{}': {}", file.display(), e))
}

fn compile_file(file: &Path, registry: &Registry) -> Result<Program, String> {
    let source = read_source(file)?;
    compile(&source, registry).map_err(|e| {
        let mut message = format!("{}:{}\n  {}", file.display(), e, e.statement);
        if let Some(hint) = e.hint() {
            message.push_str(&format!("\n  hint: {}", hint));
        }
        message
    })
}
