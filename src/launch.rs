//! Hub-side launch recording.
//!
//! Runs once per successful LTI authentication, after the authenticator has
//! verified the launch signature. Signature checks are not repeated here.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::store::{DbHandle, LtiLaunchParams, LtiSession, SessionDb};

/// A verified launch as handed over by the authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchEvent {
    pub params: LtiLaunchParams,
    /// `oauth_consumer_key` of the launch request.
    pub consumer_key: String,
}

/// Store `event`, replacing any earlier launch for the same link and user.
pub fn record_launch(db: &SessionDb, event: &LaunchEvent) -> Result<LtiSession, StoreError> {
    match db.upsert_session(&event.params, &event.consumer_key) {
        Ok(session) => {
            info!(
                user_id = %session.user_id,
                resource_link_id = %session.resource_link_id,
                consumer_key = %session.oauth_consumer_key,
                checkout_location = session.checkout_location.as_deref().unwrap_or("-"),
                "recorded LTI launch"
            );
            Ok(session)
        }
        Err(err) => {
            warn!(consumer_key = %event.consumer_key, error = %err, "failed to record LTI launch");
            Err(err)
        }
    }
}

/// Async recorder for use inside the hub's request handlers.
#[derive(Clone)]
pub struct LaunchRecorder {
    db: DbHandle,
}

impl LaunchRecorder {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn record(&self, event: LaunchEvent) -> Result<LtiSession, StoreError> {
        self.db.call(move |db| record_launch(db, &event)).await
    }
}
