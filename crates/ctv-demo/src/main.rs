//! Drive the casting channel bridge from a terminal.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ctv_android::{encode_method_call, BridgeCore};
use ctv_core::config::{BridgeConfig, EngineKind};
use ctv_core::MethodCall;

mod script;

use script::ScriptStep;

#[derive(Parser)]
#[command(name = "ctv-demo")]
#[command(about = "Send cast-to-TV channel calls to the native bridge")]
struct Args {
    /// Configuration file path (TOML); defaults come from CTV_* variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command handler: placeholder or simulated
    #[arg(short, long)]
    engine: Option<EngineKind>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one call and print its reply envelope
    Call {
        /// Method name, e.g. startScreenMirroring
        method: String,
        /// Arguments as JSON
        args: Option<String>,
    },
    /// Read `METHOD [ARGS_JSON]` or `wait MILLIS` lines from stdin
    Script,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BridgeConfig::load_from_env().context("reading CTV_* environment")?,
    };
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    let _guard = init_logging(&config.log_level, config.log_file.as_deref());
    info!("starting ctv-demo with {} engine", config.engine);

    let bridge = BridgeCore::from_config(config)?;

    match args.command {
        Command::Call { method, args } => {
            match script::parse_arguments(args.as_deref().unwrap_or("")) {
                Ok(arguments) => println!("{}", send(&bridge, MethodCall::new(method, arguments))),
                Err(e) => println!("error: {:#}", e),
            }
        }
        Command::Script => {
            let stdin = std::io::stdin();
            run_script(&bridge, stdin.lock(), &mut std::io::stdout())?;
        }
    }

    Ok(())
}

/// Run script lines against the bridge. A bad line is reported and skipped.
fn run_script<R: BufRead, W: Write>(
    bridge: &BridgeCore,
    input: R,
    out: &mut W,
) -> std::io::Result<()> {
    for (index, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stopped reading script: {}", e);
                writeln!(out, "error: {}", e)?;
                break;
            }
        };
        match script::parse_line(&line).with_context(|| format!("line {}", index + 1)) {
            Ok(Some(ScriptStep::Call(call))) => writeln!(out, "{}", send(bridge, call))?,
            Ok(Some(ScriptStep::Wait(delay))) => std::thread::sleep(delay),
            Ok(None) => {}
            Err(e) => writeln!(out, "error: {:#}", e)?,
        }
    }
    Ok(())
}

/// Round-trip one call through the codec and describe the reply.
fn send(bridge: &BridgeCore, call: MethodCall) -> String {
    let method = call.method.clone();
    let envelope = bridge.invoke(&encode_method_call(&call));
    let reply = if envelope.is_empty() {
        "(not implemented)".to_string()
    } else {
        String::from_utf8_lossy(&envelope).into_owned()
    };

    match bridge.capture_state() {
        Some(state) => format!("{} -> {} [{}]", method, reply, state.name()),
        None => format!("{} -> {}", method, reply),
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(format!(
        "ctv_demo={},ctv_android={},ctv_core={}",
        level, level, level
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "ctv-demo.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}
