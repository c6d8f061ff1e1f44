//! Environment bridge commands: `ltipass exec|env`.

use anyhow::{Context, Result};
use tracing::info;

use ltipass::config::LtipassConfig;

use super::store::open_db;

/// Spawn `command` with the session's launch parameters exported, wait for
/// it, and return its exit code.
pub async fn cmd_exec(
    config: &LtipassConfig,
    user_id: &str,
    resource_link_id: &str,
    command: &[String],
) -> Result<i32> {
    let db = open_db(config)?;
    let session = db.get_session(resource_link_id, user_id)?.with_context(|| {
        format!(
            "No LTI session for link '{}' and user '{}'",
            resource_link_id, user_id
        )
    })?;

    let (program, args) = command
        .split_first()
        .context("No command given to run")?;

    let mut child = tokio::process::Command::new(program);
    child.args(args);
    config.param_bridge().apply(&mut child, &session.lti_params);

    info!(user_id, resource_link_id, program = %program, "spawning with LTI environment");
    let status = child
        .status()
        .await
        .with_context(|| format!("Failed to run '{}'", program))?;

    Ok(status.code().unwrap_or(1))
}

pub fn cmd_env(config: &LtipassConfig) {
    let params = config.param_bridge().from_env();
    if params.is_empty() {
        println!("No LTI parameters in the environment.");
        return;
    }
    for (key, value) in params.iter() {
        println!("{}={}", key, value);
    }
}
