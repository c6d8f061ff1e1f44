//! Session store commands: `ltipass init|record|resolve|sessions`.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use ltipass::config::LtipassConfig;
use ltipass::launch::{LaunchEvent, record_launch};
use ltipass::resolver::{page_vars, resolve_context};
use ltipass::store::{LtiLaunchParams, SessionDb};

pub fn open_db(config: &LtipassConfig) -> Result<SessionDb> {
    SessionDb::open_with(&config.store.path, config.store_options()).with_context(|| {
        format!(
            "Failed to open session store {}",
            config.store.path.display()
        )
    })
}

pub fn cmd_init(config: &LtipassConfig) -> Result<()> {
    let db = open_db(config)?;
    println!(
        "Session store ready at {} ({} sessions)",
        config.store.path.display(),
        db.count()?
    );
    Ok(())
}

fn read_params(source: &Path) -> Result<LtiLaunchParams> {
    let content = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read launch parameters from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?
    };
    serde_json::from_str(&content).context("Launch parameters must be a JSON object of strings")
}

pub fn cmd_record(config: &LtipassConfig, consumer_key: &str, source: &Path) -> Result<()> {
    let db = open_db(config)?;
    let event = LaunchEvent {
        params: read_params(source)?,
        consumer_key: consumer_key.to_string(),
    };
    let session = record_launch(&db, &event)?;
    println!(
        "Recorded session {} for user '{}' on link '{}' (checkout: {})",
        session.id,
        session.user_id,
        session.resource_link_id,
        session.checkout_location.as_deref().unwrap_or("none")
    );
    Ok(())
}

pub fn cmd_resolve(config: &LtipassConfig, user_id: &str, path: &str, vars: bool) -> Result<()> {
    let db = open_db(config)?;
    let context = resolve_context(&db, path, user_id)?;

    if vars {
        for (key, value) in page_vars(context.as_ref(), user_id) {
            println!("{}={}", key, value);
        }
        return Ok(());
    }

    match context {
        Some(context) => println!("{}", serde_json::to_string_pretty(&context)?),
        None => println!("No LTI session for '{}' and user '{}'", path, user_id),
    }
    Ok(())
}

pub fn cmd_sessions(config: &LtipassConfig, user_id: Option<&str>, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let sessions = db.list_sessions(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!(
        "{:<5} {:<16} {:<24} {:<16} CHECKOUT",
        "ID", "USER", "RESOURCE LINK", "CONSUMER"
    );
    for s in &sessions {
        println!(
            "{:<5} {:<16} {:<24} {:<16} {}",
            s.id,
            s.user_id,
            s.resource_link_id,
            s.oauth_consumer_key,
            s.checkout_location.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{} session(s)", sessions.len());
    Ok(())
}
