//! Environment-variable side channel from the hub to a spawned user server.
//!
//! The hub exports selected launch parameters as `LTI_<KEY>` variables when
//! it spawns the single-user server; the server reads them back with the
//! prefix stripped and the key lower-cased. Only the latest launch for that
//! process travels this way, so the session store stays authoritative.

use std::collections::BTreeMap;

use crate::store::{LtiLaunchParams, keys};

pub const DEFAULT_PREFIX: &str = "LTI_";

/// Parameters exported when no explicit list is configured.
pub fn default_keys() -> Vec<String> {
    [
        keys::RESOURCE_LINK_ID,
        keys::USER_ID,
        keys::CONTEXT_TITLE,
        keys::RETURN_URL,
        keys::RESULT_SOURCEDID,
        keys::OUTCOME_SERVICE_URL,
        keys::CUSTOM_NEXT,
        "context_id",
        "roles",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBridge {
    prefix: String,
    /// Parameter names to export. Empty exports everything.
    keys: Vec<String>,
}

impl Default for ParamBridge {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, default_keys())
    }
}

impl ParamBridge {
    pub fn new(prefix: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            keys,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Environment variables for `params`.
    ///
    /// Parameters whose names would not form a portable variable name are
    /// skipped rather than mangled.
    pub fn export(&self, params: &LtiLaunchParams) -> Vec<(String, String)> {
        let selected: Vec<(&str, &str)> = if self.keys.is_empty() {
            params.iter().collect()
        } else {
            self.keys
                .iter()
                .filter_map(|k| params.get(k).map(|v| (k.as_str(), v)))
                .collect()
        };

        selected
            .into_iter()
            .filter(|(key, _)| is_portable_name(key))
            .map(|(key, value)| {
                (
                    format!("{}{}", self.prefix, key.to_ascii_uppercase()),
                    value.to_string(),
                )
            })
            .collect()
    }

    /// Set the exported variables on a child process about to be spawned.
    pub fn apply(&self, command: &mut tokio::process::Command, params: &LtiLaunchParams) {
        for (name, value) in self.export(params) {
            command.env(name, value);
        }
    }

    /// Read launch parameters back from `(name, value)` pairs.
    pub fn import<I, K, V>(&self, vars: I) -> LtiLaunchParams
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = BTreeMap::new();
        for (name, value) in vars {
            if let Some(key) = name.as_ref().strip_prefix(&self.prefix)
                && !key.is_empty()
            {
                params.insert(key.to_ascii_lowercase(), value.into());
            }
        }
        params.into()
    }

    /// Launch parameters visible in this process's environment.
    pub fn from_env(&self) -> LtiLaunchParams {
        self.import(std::env::vars())
    }
}

fn is_portable_name(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
