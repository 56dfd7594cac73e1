use std::{env, env::VarError, process};

use clap::{error::ErrorKind, Parser};

/// Loyalty points server.
///
/// Flags override the matching environment variables.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "loyalty_server", version, after_long_help = include_str!("./cli-help.txt"))]
pub struct Arguments {
    /// Address to listen on, as host:port. Overrides RUN_ADDRESS (default 127.0.0.1:8080)
    #[arg(short = 'a', long = "address", value_name = "HOST:PORT")]
    pub run_address: Option<String>,
    /// Database URI. Overrides DATABASE_URI (default sqlite://data/loyalty.db)
    #[arg(short = 'd', long = "database", value_name = "URI")]
    pub database_uri: Option<String>,
    /// Base URL of the accrual service. Overrides ACCRUAL_SYSTEM_ADDRESS (default http://localhost:8081)
    #[arg(short = 'r', long = "accrual", value_name = "URL")]
    pub accrual_address: Option<String>,
}

/// Parses the process arguments. `--help` also lists the current environment before exiting.
pub fn handle_command_line_args() -> Arguments {
    match Arguments::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            let _ = e.print();
            display_envs();
            process::exit(0);
        },
        Err(e) => e.exit(),
    }
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "RUN_ADDRESS",
        "DATABASE_URI",
        "ACCRUAL_SYSTEM_ADDRESS",
        "LOYALTY_QUEUE_CAPACITY",
        "LOYALTY_MAX_ATTEMPTS",
        "LOYALTY_RETRY_MIN_DELAY_MS",
        "LOYALTY_RETRY_MAX_DELAY_MS",
        "LOYALTY_POLL_INTERVAL_MS",
        "LOYALTY_ORACLE_TIMEOUT_MS",
        "LOYALTY_DB_MAX_CONNECTIONS",
    ];

    println!("\nCurrent environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
