//! Clap command tree for the `casrace` binary.

use clap::{Arg, ArgAction, Command};

/// Build the top-level command.
pub fn build_cli() -> Command {
    Command::new("casrace")
        .about("Race workers on a replicated store's compare-and-swap")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("host")
                .long("host")
                .global(true)
                .default_value("127.0.0.1")
                .help("Contact point host"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .global(true)
                .default_value("9042")
                .help("Contact point port"),
        )
        .arg(
            Arg::new("retry-policy")
                .long("retry-policy")
                .global(true)
                .value_parser(["statement", "three", "callback", "documented"])
                .help("Retry policy (default: $CASRACE_RETRY_POLICY, else statement)"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .global(true)
                .value_parser(["human", "json"])
                .default_value("human")
                .help("Attempt record format"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .global(true)
                .help("JSON file the cluster's rows are loaded from and saved to"),
        )
        .arg(
            Arg::new("replicas")
                .long("replicas")
                .global(true)
                .default_value("3")
                .help("Replication factor"),
        )
        .arg(
            Arg::new("live")
                .long("live")
                .global(true)
                .help("Live replicas (default: all)"),
        )
        .arg(
            Arg::new("write-timeout-rate")
                .long("write-timeout-rate")
                .global(true)
                .default_value("0")
                .help("Probability that a write times out"),
        )
        .subcommand(Command::new("read").about("Print the record's revision"))
        .subcommand(Command::new("create").about("Write the record at revision 0"))
        .subcommand(Command::new("cas").about("Read, then make one conditional update"))
        .subcommand(
            Command::new("cas-thread")
                .about("Read and make one conditional update, both on another thread"),
        )
        .subcommand(
            Command::new("read-main-then-cas-thread")
                .about("Read on the main thread, then make one conditional update on another"),
        )
        .subcommand(
            Command::new("relay")
                .about("Drive the record to TARGET with one worker on the main thread")
                .arg(Arg::new("target").required(true).help("Target revision"))
                .arg(
                    Arg::new("delay")
                        .long("delay")
                        .default_value("0")
                        .help("Startup delay in milliseconds"),
                ),
        )
        .subcommand(race_command("race", "Race WORKERS workers on one shared session"))
        .subcommand(race_command(
            "race-sessions",
            "Race WORKERS workers, each on its own session",
        ))
}

fn race_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("workers").required(true).help("Number of workers"))
        .arg(
            Arg::new("delay")
                .required(true)
                .help("Startup delay in milliseconds"),
        )
        .arg(Arg::new("target").required(true).help("Target revision"))
        .arg(
            Arg::new("stop-on-first")
                .long("stop-on-first")
                .action(ArgAction::SetTrue)
                .help("Stop collecting after the first worker finishes"),
        )
        .arg(
            Arg::new("queue-capacity")
                .long("queue-capacity")
                .help("Bound the outcome queue"),
        )
        .arg(
            Arg::new("drop-on-full")
                .long("drop-on-full")
                .action(ArgAction::SetTrue)
                .requires("queue-capacity")
                .help("Discard attempts instead of waiting when the queue is full"),
        )
}
