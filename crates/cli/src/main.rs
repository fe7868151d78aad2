//! casrace CLI: drive CAS races against a simulated replicated store.
//!
//! `casrace [flags] COMMAND` runs one command and exits 0 on success, 1 on
//! error. Attempt records go to stdout; logs go to stderr (`RUST_LOG`).

mod commands;
mod parse;

use std::io;
use std::process;

use casrace::{CasOutcome, CasRace, Error, OutputFormat, RaceReport, Revision};
use tracing::error;

use commands::build_cli;
use parse::{matches_to_action, matches_to_harness, CliAction, HarnessArgs};

fn main() {
    init_tracing();

    let matches = build_cli().get_matches();

    let args = match matches_to_harness(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };
    let action = match matches_to_action(&matches, args.format) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };

    let harness = match open_harness(&args) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("Failed to open harness: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match run(&harness, action, args.format) {
        Ok(code) => code,
        Err(e) => {
            error!(fatal = e.is_fatal(), "{}", e);
            eprintln!("(error) {}", e);
            1
        }
    };

    if let Err(e) = harness.save_state() {
        eprintln!("Failed to save state: {}", e);
        process::exit(1);
    }
    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn open_harness(args: &HarnessArgs) -> casrace::Result<CasRace> {
    let mut builder = CasRace::builder()
        .contact_point(args.host.clone(), args.port)
        .replicas(args.replicas)
        .write_timeout_rate(args.write_timeout_rate);
    if let Some(kind) = args.retry_policy {
        builder = builder.retry_policy(kind);
    }
    if let Some(live) = args.live {
        builder = builder.live_replicas(live);
    }
    if let Some(state) = &args.state {
        builder = builder.state_file(state);
    }
    builder.open()
}

fn run(harness: &CasRace, action: CliAction, format: OutputFormat) -> Result<i32, Error> {
    match action {
        CliAction::Read => {
            println!("{}", harness.read()?);
            Ok(0)
        }
        CliAction::Create => {
            println!("{}", harness.create()?);
            Ok(0)
        }
        CliAction::Cas => print_cas(harness.cas()?),
        CliAction::CasThread => print_cas(harness.cas_thread()?),
        CliAction::ReadMainThenCasThread => print_cas(harness.read_main_then_cas_thread()?),
        CliAction::Relay { target, delay } => {
            let (report, _) = harness.relay(target, delay, format, io::stdout())?;
            Ok(report_exit_code(&report))
        }
        CliAction::Race(config) => {
            let (report, _) = harness.race(&config, io::stdout())?;
            Ok(report_exit_code(&report))
        }
        CliAction::RaceSessions(config) => {
            let (report, _) = harness.race_sessions(&config, io::stdout())?;
            Ok(report_exit_code(&report))
        }
    }
}

fn print_cas((prev, outcome): (Revision, CasOutcome)) -> Result<i32, Error> {
    // A returned outcome means prev + 1 was representable
    println!("CAS to {}", prev.saturating_add(1));
    println!("{}", outcome);
    Ok(0)
}

/// 0 when every worker reached its target, 1 otherwise.
fn report_exit_code(report: &RaceReport) -> i32 {
    for err in report.errors() {
        eprintln!("(error) {}", err);
    }
    if report.is_clean() {
        0
    } else {
        1
    }
}
