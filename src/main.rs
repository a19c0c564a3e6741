use atrea_duplex_tools::commands;
use clap::Parser as _;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Inspect and control Atrea Duplex ventilation units.
#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Command {
    Registers(commands::registers::Args),
    Status(commands::status::Args),
    Watch(commands::watch::Args),
    Set(commands::set::Args),
}

fn finish<E: std::error::Error>(outcome: Result<(), E>) -> ExitCode {
    let Err(error) = outcome else {
        return ExitCode::SUCCESS;
    };
    eprintln!("error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    ExitCode::FAILURE
}

fn init_tracing() {
    let description =
        std::env::var("ATREA_TOOLS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = description
        .parse::<tracing_subscriber::filter::targets::Targets>()
        .expect("ATREA_TOOLS_LOG must be a valid tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    match Command::parse() {
        Command::Registers(args) => finish(commands::registers::run(args)),
        Command::Status(args) => finish(commands::status::run(args)),
        Command::Watch(args) => finish(commands::watch::run(args)),
        Command::Set(args) => finish(commands::set::run(args)),
    }
}
