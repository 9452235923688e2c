use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use jsdebug_protocol::{Binder, OPAQUE_TYPE};
use jsdebug_session::schema::{
    protocol_registry_builder, V8_BREAK_BODY, WIP_PAUSED_PARAMS, WIP_SCRIPT_PARSED,
};
use jsdebug_session::{
    connect, Dialect, Endpoint, EventView, OutgoingCommand, SequenceGenerator, Session,
    SessionConfig,
};
use tracing::{info, warn};

/// Attach to a V8 or WebInspector debug endpoint and print protocol traffic.
#[derive(Debug, Parser)]
#[command(name = "jsdebug", version)]
struct Cli {
    /// Debug endpoint (`tcp://host:port` or `unix:///path`).
    #[arg(long)]
    endpoint: Endpoint,

    /// Session configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wire dialect (`v8` or `wip`); overrides the configuration file.
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Command to send; repeatable.
    #[arg(long = "command", value_name = "NAME")]
    commands: Vec<String>,

    /// JSON parameters for the preceding `--command`.
    #[arg(long = "params", value_name = "JSON")]
    params: Vec<String>,

    /// Seconds to wait for each reply.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("jsdebug error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let commands = paired_commands(&matches, &cli)?;

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    }
    .with_env_overrides();
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }

    let registry = protocol_registry_builder()?.build()?;
    let binder = Binder::new(Arc::new(registry));
    let (transport, source) = connect(&cli.endpoint)
        .with_context(|| format!("cannot connect to {}", cli.endpoint))?;
    let session = Session::new(
        &config,
        binder,
        Arc::new(transport),
        Arc::new(SequenceGenerator::new()),
    )?;
    register_printers(&session)?;
    session.set_status_listener(|status| info!(%status, "session status"));
    info!(endpoint = %cli.endpoint, dialect = config.dialect.name(), "attached");
    let reader = session.spawn_reader(source);

    let mut replies = Vec::with_capacity(commands.len());
    for command in &commands {
        let (_, receiver) = session.send_with_reply(command.clone(), None)?;
        replies.push((command.name().clone(), receiver));
    }
    let timeout = Duration::from_secs(cli.timeout);
    for (name, receiver) in replies {
        match receiver.recv_timeout(timeout) {
            Ok(Ok(reply)) => println!("{name} -> {}", reply.raw()),
            Ok(Err(failure)) => println!("{name} failed: {failure}"),
            Err(_) => warn!(command = %name, "no reply"),
        }
    }

    if !commands.is_empty() {
        session.close("done");
    }
    reader
        .join()
        .map_err(|_| anyhow!("reader thread panicked"))?;
    Ok(())
}

/// Pairs each `--params` with the closest `--command` before it.
fn paired_commands(matches: &ArgMatches, cli: &Cli) -> anyhow::Result<Vec<OutgoingCommand>> {
    let command_positions: Vec<usize> = matches
        .indices_of("commands")
        .map(Iterator::collect)
        .unwrap_or_default();
    let mut commands: Vec<OutgoingCommand> =
        cli.commands.iter().map(|name| OutgoingCommand::new(name.as_str())).collect();
    let param_positions = matches.indices_of("params").into_iter().flatten();
    for (position, text) in param_positions.zip(&cli.params) {
        let index = command_positions
            .iter()
            .rposition(|command| *command < position)
            .ok_or_else(|| anyhow!("--params {text} does not follow a --command"))?;
        let params = serde_json::from_str(text)
            .with_context(|| format!("invalid --params for {}", cli.commands[index]))?;
        commands[index] = commands[index].clone().with_raw_params(params);
    }
    Ok(commands)
}

fn register_printers(session: &Session) -> anyhow::Result<()> {
    let events: &[(&str, &str)] = match session.dialect() {
        Dialect::V8 => &[
            ("break", V8_BREAK_BODY),
            ("exception", V8_BREAK_BODY),
            ("afterCompile", OPAQUE_TYPE),
        ],
        Dialect::Wip => &[
            ("Debugger.paused", WIP_PAUSED_PARAMS),
            ("Debugger.resumed", OPAQUE_TYPE),
            ("Debugger.scriptParsed", WIP_SCRIPT_PARSED),
        ],
    };
    for (name, type_id) in events {
        session.on_event(*name, *type_id, print_event)?;
    }
    Ok(())
}

fn print_event(event: EventView) {
    println!("event {} {}", event.name(), event.raw());
}
