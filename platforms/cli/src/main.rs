use clap::Parser;
use std::io;
use std::path::PathBuf;
use varphi::{compile_file, runner, DebugSession, Program, VarphiError};

#[derive(Parser)]
#[clap(name = "varphi", about, long_about = None, arg_required_else_help = true, disable_version_flag = true)]
struct Cli {
    /// The Varphi source file to execute
    program: Option<PathBuf>,

    /// Run step by step in the terminal, pausing before each transition
    #[clap(short = 'd', long)]
    debug: bool,

    /// Enter a Debug Adapter Protocol session on stdin/stdout
    #[clap(short = 'a', long)]
    debug_adapter: bool,

    /// Print the number of steps taken and tape cells accessed
    #[clap(short = 'c', long)]
    complexity: bool,

    /// Prompt for the input tape and label the output tape
    #[clap(short = 'p', long)]
    enable_prompts: bool,

    /// Display the interpreter version
    #[clap(short = 'v', long)]
    version: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(path) = cli.program.as_deref() else {
        eprintln!("Error: No Varphi source file provided.");
        std::process::exit(1);
    };

    let program = match compile_file(path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatch(&cli, program) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn dispatch(cli: &Cli, program: Program) -> Result<(), VarphiError> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    if cli.debug {
        runner::run_stepwise(&program, stdin.lock(), stdout.lock())
    } else if cli.debug_adapter {
        DebugSession::new(program, stdin.lock(), stdout.lock()).run()
    } else if cli.complexity {
        runner::run_with_complexity(&program, stdin.lock(), stdout.lock())
    } else if cli.enable_prompts {
        runner::run_with_prompts(&program, stdin.lock(), stdout.lock())
    } else {
        runner::run(&program, stdin.lock(), stdout.lock())
    }
}
