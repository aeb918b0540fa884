//! The five `pod` subcommands. Only `deploy` and the compile pipeline
//! behind it carry real logic here; `new`, `dev`, `add`, and `dockerize`
//! are explicitly out of scope and exist only so the command surface is
//! complete end to end.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pod", version)]
#[command(about = "Command-center tooling for a component-oriented web framework")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold a new project. Not implemented in this tool — template
    /// generation is an external collaborator.
    New {
        name: String,
    },
    /// Start the watched build. Not implemented in this tool — wraps an
    /// off-the-shelf bundler.
    Dev,
    /// Generate a component or feature. Not implemented in this tool —
    /// boilerplate string emission.
    Add {
        #[arg(value_enum)]
        kind: AddKind,
        name: String,
    },
    /// Generate container files for an environment. Not implemented in
    /// this tool — container file generation.
    Dockerize {
        env: String,
    },
    /// Run the macro expander over a project, printing the rewritten
    /// source for every file that contains a macro sigil. This is the
    /// compile pipeline's single-file transform contract driven
    /// project-wide, ahead of the deploy step.
    Compile {
        /// Project root to walk. Defaults to the current directory.
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Run the idempotent deploy orchestrator against a named target in
    /// `pod.deploy.yml`.
    Deploy {
        target: String,
        #[arg(long = "force-install")]
        force_install: bool,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum AddKind {
    C,
    F,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.cmd {
        Commands::New { name } => not_implemented("new", &format!("scaffold project `{name}`")),
        Commands::Dev => not_implemented("dev", "start the watched build"),
        Commands::Add { kind, name } => {
            let kind = match kind {
                AddKind::C => "component",
                AddKind::F => "feature",
            };
            not_implemented("add", &format!("generate {kind} `{name}`"))
        }
        Commands::Dockerize { env } => {
            not_implemented("dockerize", &format!("generate container files for `{env}`"))
        }
        Commands::Compile { root } => {
            let root = root.unwrap_or(cwd);
            let results = pod_core::expand_project(&root)?;
            for result in &results {
                println!("// {}", result.path.display());
                println!("{}", result.source);
            }
            Ok(())
        }
        Commands::Deploy { target, force_install } => {
            pod_core::run_deploy(&cwd, &target, force_install)
        }
    }
}

fn not_implemented(subcommand: &str, action: &str) -> Result<()> {
    anyhow::bail!("`pod {subcommand}` is not implemented in this tool ({action} is out of scope)")
}
