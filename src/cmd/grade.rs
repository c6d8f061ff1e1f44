//! Grade reporting command: `ltipass grade`.

use anyhow::{Context, Result};

use ltipass::config::LtipassConfig;
use ltipass::errors::OutcomeError;
use ltipass::outcome::{HttpOutcomeClient, report_score};
use ltipass::resolver::normalize_path;

use super::store::open_db;

pub async fn cmd_grade(config: &LtipassConfig, user_id: &str, path: &str, score: f64) -> Result<()> {
    let db = open_db(config)?;
    let session = db
        .find_session_for_path(normalize_path(path), user_id)?
        .with_context(|| format!("No LTI session for '{}' and user '{}'", path, user_id))?;

    let client = HttpOutcomeClient::new(config.outcome_timeout())?;
    match report_score(&client, &config.consumer_secrets(), &session, score).await {
        Ok(resp) => {
            println!(
                "Grade {} reported for '{}' ({}: {})",
                score, session.user_id, resp.code_major, resp.description
            );
            Ok(())
        }
        Err(OutcomeError::Rejected {
            status,
            code_major,
            description,
            body,
        }) => {
            eprintln!("Response body:\n{}", body);
            anyhow::bail!(
                "LMS rejected the grade (HTTP {}, {}): {}",
                status,
                code_major,
                description
            )
        }
        Err(e) => Err(e.into()),
    }
}
