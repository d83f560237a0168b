//! firecache - headless demo of the listener cache.
//!
//! Runs the cached screens against a seeded in-memory database. Each command
//! shows what was cached by the previous run before the live data arrives,
//! and `--offline` shows what a user would see with no connection.

mod demo;
mod models;
mod seed;

use std::io;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use demo::{Demo, DEFAULT_KEEP};
use firecache_core::CacheConfig;

const USAGE: &str = "\
Usage: firecache [--offline] <command>

Commands:
  items [user]      Show a user's item list (default: user1)
  item <id>         Show a single item
  messages [keep]   Show messages, caching the first <keep> (default: 2)
  clear [path]      Clear the whole cache, or one location
  keys              List cached keys";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG to control log level (e.g., RUST_LOG=firecache_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let offline = match args.iter().position(|a| a == "--offline") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };

    let config = CacheConfig::load().context("Failed to load config")?;
    info!(namespace = %config.namespace, offline, "firecache starting");
    let demo = Demo::new(&config, offline)?;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["items"] => demo.show_items(seed::DEFAULT_USER).await,
        ["items", user] => demo.show_items(*user).await,
        ["item", id] => demo.show_item(*id).await,
        ["messages"] => demo.show_messages(DEFAULT_KEEP).await,
        ["messages", keep] => {
            let keep = keep
                .parse()
                .with_context(|| format!("Invalid message count: {}", keep))?;
            demo.show_messages(keep).await
        }
        ["clear"] => demo.clear(None).await,
        ["clear", path] => demo.clear(Some(*path)).await,
        ["keys"] => demo.list_keys().await,
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}
