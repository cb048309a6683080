use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use faultline::prelude::*;
use std::process::ExitCode;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tracing::info;

const HEARTBEAT: Duration = Duration::from_secs(60);

fn file_arg() -> Arg {
    Arg::new("file")
        .short('f')
        .long("file")
        .required(true)
        .help("Configuration file, or - to read it from stdin")
}

fn cli() -> Command {
    Command::new("faultline")
        .version(faultline::VERSION)
        .about("Controllable fault-injection harness")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("start")
                .about("Run every configured fault until interrupted")
                .arg(file_arg())
                .arg(
                    Arg::new("verbosity")
                        .short('v')
                        .long("verbosity")
                        .default_value("info")
                        .help("Log level: trace, debug, info, warn or error"),
                )
                .arg(
                    Arg::new("json-logs")
                        .long("json-logs")
                        .action(ArgAction::SetTrue)
                        .help("Emit one JSON object per log line"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducible runs"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Load and prepare a configuration without running it")
                .arg(file_arg()),
        )
        .subcommand(Command::new("version").about("Print the version"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("start", args)) => start(args).await,
        Some(("validate", args)) => validate(args),
        Some(("version", _)) => {
            println!("faultline {}", faultline::VERSION);
            Ok(())
        }
        _ => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn filename(args: &ArgMatches) -> &str {
    args.get_one::<String>("file").map_or("", String::as_str)
}

fn validate(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::load(filename(args))?;
    PreparedConfig::new(&config, PlannerSettings::default())?;
    println!("configuration is valid");
    Ok(())
}

async fn start(args: &ArgMatches) -> anyhow::Result<()> {
    let verbosity = args.get_one::<String>("verbosity").map_or("", String::as_str);
    let format = if args.get_flag("json-logs") {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    faultline::logging::init(verbosity, format)?;

    let settings = PlannerSettings {
        seed: args.get_one::<u64>("seed").copied(),
        ..PlannerSettings::default()
    };
    let config = Config::load(filename(args)).context("invalid configuration")?;
    let prepared =
        PreparedConfig::new(&config, settings).context("invalid prepared configuration")?;

    info!(
        version = faultline::VERSION,
        schema = prepared.schema_version().unwrap_or("unspecified"),
        "starting faultline"
    );
    let started = Instant::now();
    let running = prepared.start().await;

    let mut heartbeat = interval_at(started + HEARTBEAT, HEARTBEAT);
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let uptime = Duration::from_secs(started.elapsed().as_secs());
                info!(uptime = %humantime::format_duration(uptime), "faultline is alive");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("unable to listen for interrupt")?;
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    running.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn start_arguments() {
        let matches = cli()
            .try_get_matches_from(["faultline", "start", "-f", "-", "--json-logs", "--seed", "7"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "start");
        assert_eq!(filename(args), "-");
        assert!(args.get_flag("json-logs"));
        assert_eq!(args.get_one::<u64>("seed"), Some(&7));
        assert_eq!(args.get_one::<String>("verbosity").unwrap(), "info");
    }

    #[test]
    fn file_is_required() {
        assert!(cli().try_get_matches_from(["faultline", "validate"]).is_err());
    }
}
