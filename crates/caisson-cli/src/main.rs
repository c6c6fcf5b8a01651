mod cli;
mod cmd;
mod format;

use clap::Parser;

use caisson_core::config::StoreConfig;
use caisson_core::error::CaissonError;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match StoreConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = match &cli.command {
        Commands::Create {
            account,
            disc_num,
            soft_limit,
            hard_limit,
        } => cmd::create::run(&config, account, *disc_num, soft_limit, hard_limit),
        Commands::Info { account, machine } => cmd::info::run(&config, account, *machine),
        Commands::Setlimit {
            account,
            soft_limit,
            hard_limit,
        } => cmd::setlimit::run(&config, account, soft_limit, hard_limit),
        Commands::Delete { account, yes } => cmd::delete::run(&config, account, *yes),
        Commands::Check {
            account,
            fix,
            quiet,
        } => match cmd::check::run(&config, account, *fix, *quiet) {
            Ok(false) => Ok(()),
            Ok(true) => {
                // Errors found; the check itself succeeded.
                std::process::exit(1);
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(exit_code_for(&e));
    }
}

/// 2 for usage errors (bad arguments), 1 for operational failures.
fn exit_code_for(e: &CaissonError) -> i32 {
    match e {
        CaissonError::BadAccountId(_)
        | CaissonError::BadSizeString(_)
        | CaissonError::BadLimits(_)
        | CaissonError::NoSuchDiscSet(_) => 2,
        _ => 1,
    }
}
