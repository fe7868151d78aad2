//! ArgMatches → CliAction conversion.
//!
//! Translates clap's parsed arguments into harness settings and the one
//! operation to run.

use std::time::Duration;

use casrace::{OutputFormat, Overflow, RaceConfig, RetryPolicyKind, Revision, StopCondition};
use clap::ArgMatches;

/// Settings the harness is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessArgs {
    pub host: String,
    pub port: u16,
    pub retry_policy: Option<RetryPolicyKind>,
    pub format: OutputFormat,
    pub state: Option<String>,
    pub replicas: usize,
    pub live: Option<usize>,
    pub write_timeout_rate: f64,
}

/// The operation to run.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Read,
    Create,
    Cas,
    CasThread,
    ReadMainThenCasThread,
    Relay { target: Revision, delay: Duration },
    Race(RaceConfig),
    RaceSessions(RaceConfig),
}

/// Convert the global flags into harness settings.
pub fn matches_to_harness(matches: &ArgMatches) -> Result<HarnessArgs, String> {
    let host = matches
        .get_one::<String>("host")
        .cloned()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = parse_or(matches, "port", 9042u16)?;
    let retry_policy = matches
        .get_one::<String>("retry-policy")
        .map(|s| s.parse::<RetryPolicyKind>())
        .transpose()?;
    let format = matches
        .get_one::<String>("format")
        .map(|s| s.parse::<OutputFormat>())
        .transpose()?
        .unwrap_or_default();
    let state = matches.get_one::<String>("state").cloned();
    let replicas = parse_or(matches, "replicas", 3usize)?;
    let live = matches
        .get_one::<String>("live")
        .map(|s| s.parse::<usize>())
        .transpose()
        .map_err(|e| format!("Invalid live: {}", e))?;
    let write_timeout_rate = parse_or(matches, "write-timeout-rate", 0.0f64)?;
    if !(0.0..=1.0).contains(&write_timeout_rate) {
        return Err(format!(
            "Invalid write-timeout-rate: {} is not between 0 and 1",
            write_timeout_rate
        ));
    }

    Ok(HarnessArgs {
        host,
        port,
        retry_policy,
        format,
        state,
        replicas,
        live,
        write_timeout_rate,
    })
}

/// Convert the subcommand into a CliAction.
pub fn matches_to_action(matches: &ArgMatches, format: OutputFormat) -> Result<CliAction, String> {
    let (sub_name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub_name {
        "read" => Ok(CliAction::Read),
        "create" => Ok(CliAction::Create),
        "cas" => Ok(CliAction::Cas),
        "cas-thread" => Ok(CliAction::CasThread),
        "read-main-then-cas-thread" => Ok(CliAction::ReadMainThenCasThread),
        "relay" => {
            let target = parse_required::<Revision>(sub_matches, "target")?;
            let delay = Duration::from_millis(parse_or(sub_matches, "delay", 0u64)?);
            Ok(CliAction::Relay { target, delay })
        }
        "race" => parse_race(sub_matches, format).map(CliAction::Race),
        "race-sessions" => parse_race(sub_matches, format).map(CliAction::RaceSessions),
        other => Err(format!("Unknown command: {}", other)),
    }
}

// =========================================================================
// Race
// =========================================================================

fn parse_race(matches: &ArgMatches, format: OutputFormat) -> Result<RaceConfig, String> {
    let workers = parse_required::<usize>(matches, "workers")?;
    let delay = Duration::from_millis(parse_required::<u64>(matches, "delay")?);
    let target = parse_required::<Revision>(matches, "target")?;

    let mut config = RaceConfig::new(workers, delay, target).format(format);
    if matches.get_flag("stop-on-first") {
        config = config.stop_condition(StopCondition::FirstWorker);
    }
    let capacity = matches
        .get_one::<String>("queue-capacity")
        .map(|s| s.parse::<usize>())
        .transpose()
        .map_err(|e| format!("Invalid queue-capacity: {}", e))?;
    if let Some(capacity) = capacity {
        let overflow = if matches.get_flag("drop-on-full") {
            Overflow::Drop
        } else {
            Overflow::Block
        };
        config = config.bounded(capacity, overflow);
    }
    Ok(config)
}

// =========================================================================
// Helpers
// =========================================================================

fn parse_required<T>(matches: &ArgMatches, name: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("Missing {}", name))?;
    raw.parse::<T>()
        .map_err(|e| format!("Invalid {}: {}", name, e))
}

fn parse_or<T>(matches: &ArgMatches, name: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    matches
        .get_one::<String>(name)
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| format!("Invalid {}: {}", name, e))
        .map(|v| v.unwrap_or(default))
}
