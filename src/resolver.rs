//! Notebook-side session resolution.
//!
//! Given the file a user is opening, find the launch that checked it out and
//! expose the handful of fields a notebook page needs: where to send the user
//! back to, the course title, and what to quote when reporting a grade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StoreError;
use crate::store::{DbHandle, LtiSession, SessionDb, keys};

/// The restricted view of a session handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtiContext {
    pub return_url: Option<String>,
    pub context_title: Option<String>,
    pub resource_link_id: String,
    pub grading_sourcedid: Option<String>,
    /// The opened file is the one the launch pointed at, not a sibling.
    pub file_is_target: bool,
}

impl LtiContext {
    pub fn from_session(session: &LtiSession, path: &str) -> Self {
        let param = |key: &str| session.lti_params.get(key).map(str::to_string);
        Self {
            return_url: param(keys::RETURN_URL),
            context_title: param(keys::CONTEXT_TITLE),
            resource_link_id: session.resource_link_id.clone(),
            grading_sourcedid: param(keys::RESULT_SOURCEDID),
            file_is_target: session.checkout_location.as_deref() == Some(path),
        }
    }

    /// Template variables for the notebook page.
    ///
    /// Names follow the launch parameter names the page templates already
    /// use, so a template can render either source.
    pub fn template_vars(&self, user_id: &str) -> BTreeMap<String, String> {
        let mut vars = page_vars(None, user_id);
        vars.insert(keys::RESOURCE_LINK_ID.to_string(), self.resource_link_id.clone());
        vars.insert("file_is_target".to_string(), self.file_is_target.to_string());
        if let Some(url) = &self.return_url {
            vars.insert(keys::RETURN_URL.to_string(), url.clone());
        }
        if let Some(title) = &self.context_title {
            vars.insert(keys::CONTEXT_TITLE.to_string(), title.clone());
        }
        vars
    }
}

/// Template variables for a page, with or without a resolved session.
/// `user_id` is always present.
pub fn page_vars(context: Option<&LtiContext>, user_id: &str) -> BTreeMap<String, String> {
    match context {
        Some(context) => context.template_vars(user_id),
        None => BTreeMap::from([("user_id".to_string(), user_id.to_string())]),
    }
}

/// Normalize a request path the way the notebook server reports it.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Resolve `path` for `user_id`. A miss is `Ok(None)`, not an error: most
/// files are opened outside any LTI launch.
pub fn resolve_context(
    db: &SessionDb,
    path: &str,
    user_id: &str,
) -> Result<Option<LtiContext>, StoreError> {
    let path = normalize_path(path);
    let session = db.find_session_for_path(path, user_id)?;
    match &session {
        Some(s) => debug!(path, user_id, resource_link_id = %s.resource_link_id, "resolved LTI session"),
        None => debug!(path, user_id, "no LTI session for path"),
    }
    Ok(session.map(|s| LtiContext::from_session(&s, path)))
}

/// Async resolver for the HTTP service.
#[derive(Clone)]
pub struct SessionResolver {
    db: DbHandle,
}

impl SessionResolver {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, path: &str, user_id: &str) -> Result<Option<LtiContext>, StoreError> {
        let path = path.to_string();
        let user_id = user_id.to_string();
        self.db
            .call(move |db| resolve_context(db, &path, &user_id))
            .await
    }

    /// The full session behind a path, for callers that need more than the
    /// rendering view (grade reporting needs the outcome service URL).
    pub async fn session_for_path(
        &self,
        path: &str,
        user_id: &str,
    ) -> Result<Option<LtiSession>, StoreError> {
        let path = normalize_path(path).to_string();
        let user_id = user_id.to_string();
        self.db
            .call(move |db| db.find_session_for_path(&path, &user_id))
            .await
    }
}
