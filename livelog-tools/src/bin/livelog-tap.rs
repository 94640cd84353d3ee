// livelog-tap
//
// Prints every event arriving on a livelog event channel, one per line,
// with a local timestamp.
//
// Build: cargo run --bin livelog-tap -- -e tcp://host:5000 [event ...]

use chrono::Local;
use clap::Parser;
use livelog::dashboard::events;
use livelog::{Channel, ConnectionError};
use livelog_tools::{init_tracing, ChannelOpts};
use serde_json::Value;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "livelog-tap", version, about = "Print events from a livelog channel")]
struct Cli {
    #[command(flatten)]
    channel: ChannelOpts,

    /// Only print these events (default: all)
    events: Vec<String>,

    #[arg(long = "no-startup", help = "Do not send `startup` on connect")]
    no_startup: bool,

    #[arg(long = "raw", help = "Print payloads as compact JSON, strings quoted")]
    raw: bool,
}

fn now() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

fn format_payload(payload: &Value, raw: bool) -> String {
    match payload {
        Value::String(s) if !raw => s.clone(),
        other => other.to_string(),
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match cli.channel.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = init_tracing(cli.channel.log_file.as_deref(), true) {
        eprintln!("Cannot open log file: {}", e);
        std::process::exit(2);
    }

    let mut link = match Channel::connect_with_timeout(&config.endpoint, config.connect_timeout()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let filter = cli.events.clone();
    let raw = cli.raw;
    link.subscribe_any(move |name, payload| {
        if filter.is_empty() || filter.iter().any(|f| f == name) {
            println!("[{}] {} {}", now(), name, format_payload(payload, raw));
        }
    });

    let announce = !cli.no_startup;
    link.on_connect(move |endpoint, emitter| {
        println!("[{}] connected to {}", now(), endpoint);
        if announce {
            if let Err(e) = emitter.emit(events::STARTUP, endpoint.to_string()) {
                eprintln!("startup not sent: {}", e);
            }
        }
    });

    loop {
        match link.dispatch_timeout(Duration::from_millis(250)) {
            Ok(_) => {}
            Err(ConnectionError::Disconnected) => {
                println!("[{}] disconnected", now());
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
}
