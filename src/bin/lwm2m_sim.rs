//! LWM2M client simulator.
//!
//! Runs client sessions against the in-memory scripted engine on a tokio
//! event loop, so session scheduling and event delivery can be watched
//! without a server.
//!
//! # Commands
//!
//! - `run` - Connect a session, simulate device activity, print events
//! - `tlv` - Encode integer or string arrays as OMA-TLV
//! - `config` - Show the resolved client configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lwm2m::{
    uri, ClientConfig, DeviceParams, Event, EventKind, Handle, Lwm2mClient, ManagementObject,
    ScriptedEngine, TokioLoop, Trigger, VERSION,
};

#[derive(Parser)]
#[command(name = "lwm2m-sim")]
#[command(version = VERSION)]
#[command(about = "LWM2M client session simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a simulated session and print its events
    Run {
        /// Config file (default: environment, then flags)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// LWM2M server URI
        #[arg(short, long)]
        server: Option<String>,

        /// Endpoint client name
        #[arg(short, long)]
        name: Option<String>,

        /// How long to run, in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Resource change to raise each interval (URI=VALUE, repeatable)
        #[arg(long = "change", value_parser = parse_change)]
        changes: Vec<(String, String)>,

        /// Interval between simulated changes, in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,

        /// Request a device reboot after this many seconds
        #[arg(long)]
        reboot_after: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Encode an array as OMA-TLV and print it as hex
    Tlv {
        /// Integer values
        #[arg(short, long, num_args = 1.., allow_negative_numbers = true, conflicts_with = "string")]
        int: Vec<i64>,

        /// String values
        #[arg(short, long, num_args = 1..)]
        string: Vec<String>,
    },

    /// Show the resolved configuration
    Config {
        /// Config file (default: user config dir)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            server,
            name,
            duration,
            changes,
            interval,
            reboot_after,
            json,
            verbose,
        } => cmd_run(
            config,
            server,
            name,
            duration,
            changes,
            interval,
            reboot_after,
            json,
            verbose,
        ),

        Commands::Tlv { int, string } => cmd_tlv(&int, &string),

        Commands::Config { file } => cmd_config(file),
    }
}

fn parse_change(s: &str) -> Result<(String, String), String> {
    let (resource, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected URI=VALUE, got {s}"))?;
    uri::validate(resource).map_err(|e| e.to_string())?;
    Ok((resource.to_string(), value.to_string()))
}

fn load_config(
    file: Option<PathBuf>,
    server: Option<String>,
    name: Option<String>,
) -> anyhow::Result<ClientConfig> {
    let mut config = match file {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env(),
    };

    if let Some(server) = server {
        config.server_uri = server;
    }
    if let Some(name) = name {
        config.client_name = name;
    }
    if config.server_uri.is_empty() {
        config.server_uri = "coap://localhost:5683".to_string();
    }
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    file: Option<PathBuf>,
    server: Option<String>,
    name: Option<String>,
    duration: u64,
    changes: Vec<(String, String)>,
    interval: u64,
    reboot_after: Option<u64>,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = load_config(file, server, name)?;
    if config.objects.is_empty() {
        config = config.with_object(ManagementObject::device(DeviceParams {
            manufacturer: Some("lwm2m-sim"),
            model_number: Some("sim-1"),
            serial_number: Some("0001"),
            battery_level: 100,
            binding_mode: Some("U"),
            ..Default::default()
        })?);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let event_loop = Arc::new(TokioLoop::new()?);
        let engine = ScriptedEngine::new();
        let client = Lwm2mClient::new(Arc::new(engine.clone()), event_loop.clone());

        let handle = client.connect(&config)?;
        for kind in EventKind::ALL {
            client.set_callback(handle, kind, move |ev: &Event| print_event(handle, ev, json))?;
        }
        tracing::info!("Simulating {} for {}s", config.client_name, duration);

        // Device activity comes from other runtime threads, like engine I/O.
        if !changes.is_empty() {
            let device = engine.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(interval.max(1)));
                ticker.tick().await;
                for (uri, value) in changes.iter().cycle() {
                    ticker.tick().await;
                    device.change_resource(uri, value.as_bytes());
                }
            });
        }
        if let Some(secs) = reboot_after {
            let device = engine.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                device.fire(Trigger::DeviceReboot, None);
            });
        }

        let quitter = Arc::clone(&event_loop);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration)).await;
            quitter.quit();
        });

        event_loop.run().await?;

        tracing::info!(
            "Session {} ended in state {} after {} service calls",
            handle,
            client.state(handle)?,
            engine.service_calls()
        );
        client.disconnect(handle)?;
        event_loop.close();
        Ok::<_, anyhow::Error>(())
    })
}

fn print_event(handle: Handle, event: &Event, json: bool) {
    if json {
        let error = match event {
            Event::Error(e) => Some(e.to_string()),
            _ => None,
        };
        let line = serde_json::json!({
            "session": handle,
            "kind": event.kind(),
            "uri": event.uri(),
            "error": error,
        });
        println!("{line}");
    } else {
        match event {
            Event::Error(e) => println!("[{handle}] error: {e}"),
            Event::ResourceExecute { uri } => println!("[{handle}] execute {uri}"),
            Event::ResourceChanged { uri } => println!("[{handle}] changed {uri}"),
        }
    }
}

fn cmd_tlv(ints: &[i64], strings: &[String]) -> anyhow::Result<()> {
    let engine = ScriptedEngine::new();
    let encoded = if strings.is_empty() {
        lwm2m::tlv::serialize_int_array(&engine, ints)?
    } else {
        lwm2m::tlv::serialize_string_array(&engine, strings)?
    };

    let hex: Vec<String> = encoded.iter().map(|b| format!("{b:02x}")).collect();
    println!("{}", hex.join(" "));
    println!("{} bytes", encoded.len());
    Ok(())
}

fn cmd_config(file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = file.or_else(ClientConfig::default_path);
    let mut config = match path {
        Some(path) if path.exists() => {
            println!("# {}", path.display());
            ClientConfig::from_file(path)?
        },
        _ => {
            println!("# environment");
            ClientConfig::from_env()
        },
    };

    if let Some(psk) = config.psk.as_mut() {
        psk.key = "<redacted>".to_string();
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
