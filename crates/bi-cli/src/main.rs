//! BlockIt CLI
//!
//! Offline tools around the background service: preview the redirect rules
//! a stored state produces, normalise site entries, resolve blocked-page
//! domains and query the release feed.

mod feed;

use std::fs;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;

use bi_background::memory::{MemoryHost, MemoryStore};
use bi_background::storage::{BlockState, LocalState};
use bi_background::{Background, Command, Config, Request};
use bi_core::{normalize_domain, resolve_blocked_domain, InterstitialView};
use bi_rules::RuleSet;

use feed::ReqwestFeed;

#[derive(Parser)]
#[command(name = "bi-cli")]
#[command(about = "BlockIt rule preview and maintenance tools")]
struct Cli {
    /// Config file (JSON, camelCase keys)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the redirect rules for a stored-state snapshot
    Rules {
        /// JSON file holding the extension's local storage
        #[arg(short, long)]
        state: String,

        /// Evaluate at this instant (epoch milliseconds) instead of now
        #[arg(long)]
        at: Option<i64>,

        /// Print the rules as dynamic-rule JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalise typed site entries into bare domains
    Normalize {
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Show what a blocked page would display
    Resolve {
        /// Blocked page URL
        #[arg(long)]
        page: String,

        #[arg(long)]
        referrer: Option<String>,

        /// Domain recorded by the navigation tracker
        #[arg(long)]
        tracked: Option<String>,

        /// Quote selector
        #[arg(long, default_value_t = 0)]
        seed: u32,
    },

    /// Ask the release feed whether a newer version exists
    CheckUpdate {
        /// Release feed URL (overrides the config)
        #[arg(long)]
        feed: Option<String>,

        /// Version to compare against (overrides the config)
        #[arg(long)]
        current: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = env_logger::builder().filter_level(level).try_init();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Rules { state, at, json } => cmd_rules(config, &state, at, json).await,
            Commands::Normalize { inputs } => cmd_normalize(&inputs),
            Commands::Resolve {
                page,
                referrer,
                tracked,
                seed,
            } => cmd_resolve(&page, referrer.as_deref(), tracked.as_deref(), seed),
            Commands::CheckUpdate { feed, current } => cmd_check_update(config, feed, current).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<Config, String> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Config::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn instant(at: Option<i64>) -> Result<DateTime<Utc>, String> {
    match at {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| format!("Invalid timestamp: {ms}")),
        None => Ok(Utc::now()),
    }
}

/// Run a full resync against an in-memory copy of `state`.
async fn preview_rules(config: Config, state: Value, now: DateTime<Utc>) -> Result<(BlockState, RuleSet), String> {
    let Value::Object(map) = state else {
        return Err("State must be a JSON object".to_string());
    };

    let mut mem = MemoryHost::new(now);
    mem.local = Rc::new(MemoryStore::from_map(map));

    let block_state = LocalState::new(mem.local.as_ref())
        .block_state()
        .await
        .map_err(|e| e.to_string())?;
    let rules = Background::new(mem.host(), config)
        .sync_rules()
        .await
        .map_err(|e| e.to_string())?;
    Ok((block_state, rules))
}

async fn cmd_rules(config: Config, path: &str, at: Option<i64>, json: bool) -> Result<(), String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let state: Value = serde_json::from_str(&text).map_err(|e| format!("Invalid state '{}': {}", path, e))?;
    let now = instant(at)?;

    let (state, rules) = preview_rules(config, state, now).await?;

    if json {
        let out = serde_json::to_string_pretty(&rules).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    let enabled = state.sites.iter().filter(|site| site.enabled).count();
    println!("State: '{}' at {}", path, now.to_rfc3339());
    println!("  Sites:       {} ({} enabled)", state.sites.len(), enabled);
    println!("  Blocking:    {}", if state.global_enabled { "on" } else { "off" });

    let now_ms = now.timestamp_millis();
    for (domain, expiry) in state.break_times.iter() {
        if expiry > now_ms {
            println!("  Break:       {} ({}s left)", domain, (expiry - now_ms) / 1000);
        }
    }
    println!();

    println!("Rules: {}", rules.len());
    for rule in rules.iter() {
        println!(
            "  [{}] {} -> {}",
            rule.id,
            rule.condition.request_domains.join(", "),
            rule.extension_path()
        );
    }

    Ok(())
}

fn cmd_normalize(inputs: &[String]) -> Result<(), String> {
    let mut failed = 0usize;
    for input in inputs {
        match normalize_domain(input) {
            Ok(domain) => println!("{input} -> {domain}"),
            Err(e) => {
                failed += 1;
                println!("{input} -> {e}");
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} inputs invalid", failed, inputs.len()));
    }
    Ok(())
}

fn cmd_resolve(page: &str, referrer: Option<&str>, tracked: Option<&str>, seed: u32) -> Result<(), String> {
    let resolved = resolve_blocked_domain(tracked, page, referrer);
    let view = InterstitialView::new(resolved.as_ref().map(|r| r.domain.as_str()), seed);

    match &resolved {
        Some(r) => println!("Domain:  {} (from {:?})", r.domain, r.source),
        None => println!("Domain:  none"),
    }
    println!("Title:   {}", view.title);
    println!("Shows:   {}", view.display_name);
    println!("Quote:   {}", view.quote);
    if view.actions_enabled {
        let minutes: Vec<String> = view.break_minutes.iter().map(|m| format!("{m}m")).collect();
        println!("Actions: unblock, break ({})", minutes.join(" / "));
    } else {
        println!("Actions: none");
    }
    Ok(())
}

async fn cmd_check_update(mut config: Config, feed: Option<String>, current: Option<String>) -> Result<(), String> {
    if let Some(current) = current {
        config.current_version = current;
    }
    let url = feed
        .or_else(|| config.release_feed_url.clone())
        .ok_or_else(|| "No release feed configured (use --feed)".to_string())?;

    let feed = ReqwestFeed::new(url.as_str()).map_err(|e| e.to_string())?;
    let mem = MemoryHost::new(Utc::now());
    let mut host = mem.host();
    host.feed = Some(Rc::new(feed));

    let current = config.current_version.clone();
    let response = Background::new(host, config)
        .dispatch(Request::new(Command::CheckForUpdates))
        .await
        .to_json();

    if response["success"] != true {
        return Err(response["error"].as_str().unwrap_or("Update check failed").to_string());
    }

    println!("Feed:      {url}");
    println!("Current:   {current}");
    match response["latestVersion"].as_str() {
        Some(latest) => println!("Latest:    {latest}"),
        None => println!("Latest:    unknown (feed unavailable)"),
    }
    if response["updateAvailable"] == true {
        println!("Update available: {}", response["releaseUrl"].as_str().unwrap_or("-"));
    } else {
        println!("Up to date");
    }
    Ok(())
}
