//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p arena_client -- [--addr 127.0.0.1:3000] [--tick-hz 60]
//!
//! The client connects to the server, joins the match, and runs the fixed-rate
//! update loop. Keyboard input is stood in for by console words.
//!
//! Console commands:
//!   left | right | straight - Hold a turn key (or neither)
//!   up                      - Toggle thrust
//!   stop                    - Release every key
//!   status                  - Show client status
//!   quit                    - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use arena_client::{GameClient, SessionError};
use arena_shared::config::ArenaConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> ArenaConfig {
    let mut cfg = ArenaConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(server = %cfg.server_addr, tick_hz = cfg.tick_hz, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    info!(session_id = %client.session_id(), "Joined match");

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client connected. Type 'left', 'right', 'up', 'stop', 'status' or 'quit'.");
    println!();

    let mut interval = tokio::time::interval(Duration::from_secs_f64(cfg.tick_secs()));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match line.as_str() {
                "status" => {
                    for line in client.status() {
                        println!("{}", line);
                    }
                }
                "quit" | "exit" => return Ok(()),
                word => {
                    if !client.input.apply_word(word) {
                        println!("Unknown command: {}", word);
                    }
                }
            }
        }

        // Inbound events first, then the local update.
        let step = client.pump().and_then(|_| client.tick());
        match step {
            Ok(_) => {}
            Err(SessionError::Closed) => {
                println!("Disconnected from server.");
                break;
            }
            Err(e) => return Err(e).context("client loop"),
        }
    }

    Ok(())
}
