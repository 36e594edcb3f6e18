//! Storefront CLI: run storefront journey suites
//!
//! ## Usage
//!
//! ```bash
//! storefront env --browser cloud          # Show where the suite would run
//! storefront register                     # Create an account over HTTP
//! storefront run --headless               # Run every journey locally
//! BROWSER=cloud storefront run -f login   # Run on the remote grid
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use storefront_cli::{
    init_logging, run_env, run_register, run_suite, Cli, CliConfig, CliResult, Commands, RunArgs,
};
use storefront_harness::{Engine, ProcessEnv};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::from_cli(&cli);
    init_logging(config);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: CliConfig) -> CliResult<()> {
    let env = ProcessEnv::from_process();
    match cli.command {
        Commands::Env(args) => run_env(config, &cli.config, &args, &env),
        Commands::Register(args) => run_register(config, &cli.config, &args).await,
        Commands::Run(args) => {
            let engine = engine(&args)?;
            run_suite(config, &cli.config, &args, &env, engine).await
        }
    }
}

#[cfg(feature = "browser")]
fn engine(args: &RunArgs) -> CliResult<Arc<dyn Engine>> {
    let mut engine = storefront_harness::CdpEngine::new();
    if args.no_sandbox {
        engine = engine.with_no_sandbox();
    }
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "browser"))]
fn engine(_args: &RunArgs) -> CliResult<Arc<dyn Engine>> {
    Err(storefront_cli::CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
