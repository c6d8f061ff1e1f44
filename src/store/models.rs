use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Launch parameter names the rest of the crate relies on.
pub mod keys {
    pub const RESOURCE_LINK_ID: &str = "resource_link_id";
    pub const USER_ID: &str = "user_id";
    pub const CUSTOM_NEXT: &str = "custom_next";
    pub const CONTEXT_TITLE: &str = "context_title";
    pub const RETURN_URL: &str = "launch_presentation_return_url";
    pub const RESULT_SOURCEDID: &str = "lis_result_sourcedid";
    pub const OUTCOME_SERVICE_URL: &str = "lis_outcome_service_url";
}

/// The parameters of one LTI launch, verbatim.
///
/// Stored as a snapshot: a later launch replaces the whole map, it is never
/// merged into the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LtiLaunchParams(BTreeMap<String, String>);

impl LtiLaunchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like `get`, but treats an empty value as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LtiLaunchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for LtiLaunchParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// A stored launch, one per (resource_link_id, user_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtiSession {
    pub id: i64,
    pub resource_link_id: String,
    pub user_id: String,
    /// Identifies the LMS that issued the launch; selects the grading secret.
    pub oauth_consumer_key: String,
    /// File the launch asked to open, relative to the user's home.
    pub checkout_location: Option<String>,
    pub lti_params: LtiLaunchParams,
    pub created_at: String,
    pub updated_at: String,
}

impl LtiSession {
    /// Top-level directory of the checkout, i.e. the cloned repository.
    pub fn checkout_root(&self) -> Option<&str> {
        self.checkout_location.as_deref().map(first_segment)
    }
}

/// First `/`-separated segment of a relative path.
///
/// Must agree with the `checkout_root` generated column in the database.
pub fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or_default()
}
