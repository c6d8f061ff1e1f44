use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::models::{LtiLaunchParams, LtiSession, first_segment, keys};
use crate::errors::StoreError;
use crate::link::LinkParser;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Async-safe handle to the session database.
///
/// Wraps `SessionDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<SessionDb>>,
}

impl DbHandle {
    pub fn new(db: SessionDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SessionDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }
}

/// Tunables for a file-backed store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for another process holding the lock.
    pub busy_timeout: Duration,
    /// Recognizes checkout links in `custom_next`.
    pub links: LinkParser,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            links: LinkParser::default(),
        }
    }
}

const SESSION_COLUMNS: &str = "id, resource_link_id, user_id, oauth_consumer_key, checkout_location, lti_params, created_at, updated_at";

/// The session-correlation store.
///
/// One row per (resource_link_id, user_id). Shared between the hub, which
/// writes on every launch, and the user servers, which read on every file
/// open; they are separate processes, so uniqueness is enforced by the
/// database and never by an in-process check.
pub struct SessionDb {
    conn: Connection,
    links: LinkParser,
}

impl SessionDb {
    /// Open (or create) the database at `path` with default options.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        // WAL lets user servers keep reading while the hub writes.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        let db = Self {
            conn,
            links: options.links,
        };
        db.run_migrations()?;
        debug!(path = %path.display(), "opened session store");
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            links: LinkParser::default(),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS lti_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_link_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                oauth_consumer_key TEXT NOT NULL,
                checkout_location TEXT,
                checkout_root TEXT GENERATED ALWAYS AS (
                    CASE
                        WHEN checkout_location IS NULL THEN NULL
                        WHEN instr(checkout_location, '/') = 0 THEN checkout_location
                        ELSE substr(checkout_location, 1, instr(checkout_location, '/') - 1)
                    END
                ) VIRTUAL,
                lti_params TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(resource_link_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_lti_sessions_location
                ON lti_sessions(user_id, checkout_location);
            CREATE INDEX IF NOT EXISTS idx_lti_sessions_root
                ON lti_sessions(user_id, checkout_root);
            ",
        )?;
        Ok(())
    }

    /// Record a launch, replacing any earlier launch of the same
    /// (resource_link_id, user_id) pair.
    ///
    /// The checkout location is derived from `custom_next`; a launch without
    /// one is still stored, it just never matches a path lookup.
    pub fn upsert_session(
        &self,
        params: &LtiLaunchParams,
        consumer_key: &str,
    ) -> Result<LtiSession> {
        let resource_link_id = required(params, keys::RESOURCE_LINK_ID)?;
        let user_id = required(params, keys::USER_ID)?;
        let checkout_location = self.checkout_location(params);
        let lti_params = serde_json::to_string(params).map_err(StoreError::InvalidParams)?;

        // Single statement: two hub processes racing on the same pair end up
        // with one row, the later launch winning.
        let row = self.conn.query_row(
            &format!(
                "INSERT INTO lti_sessions (resource_link_id, user_id, oauth_consumer_key, checkout_location, lti_params)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(resource_link_id, user_id) DO UPDATE SET
                    oauth_consumer_key = excluded.oauth_consumer_key,
                    checkout_location = excluded.checkout_location,
                    lti_params = excluded.lti_params,
                    updated_at = datetime('now')
                 RETURNING {SESSION_COLUMNS}"
            ),
            params![
                resource_link_id,
                user_id,
                consumer_key,
                checkout_location,
                lti_params
            ],
            SessionRow::from_row,
        )?;
        row.into_session()
    }

    /// Find the session that checked out `path` for `user_id`.
    ///
    /// Tries the exact checkout location first, then any session whose
    /// checkout shares the first path segment, so sibling files in a cloned
    /// repository resolve to the launch that cloned it. When several sessions
    /// qualify, the earliest recorded one wins.
    pub fn find_session_for_path(&self, path: &str, user_id: &str) -> Result<Option<LtiSession>> {
        let exact = self.query_one(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM lti_sessions
                 WHERE user_id = ?1 AND checkout_location = ?2
                 ORDER BY id LIMIT 1"
            ),
            params![user_id, path],
        )?;
        if exact.is_some() {
            return Ok(exact);
        }

        let root = first_segment(path);
        if root.is_empty() {
            return Ok(None);
        }
        self.query_one(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM lti_sessions
                 WHERE user_id = ?1 AND checkout_root = ?2
                 ORDER BY id LIMIT 1"
            ),
            params![user_id, root],
        )
    }

    /// Point lookup by the natural key.
    pub fn get_session(&self, resource_link_id: &str, user_id: &str) -> Result<Option<LtiSession>> {
        self.query_one(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM lti_sessions
                 WHERE resource_link_id = ?1 AND user_id = ?2"
            ),
            params![resource_link_id, user_id],
        )
    }

    /// All sessions, optionally for a single user, oldest first.
    pub fn list_sessions(&self, user_id: Option<&str>) -> Result<Vec<LtiSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM lti_sessions
             WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![user_id], SessionRow::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM lti_sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn checkout_location(&self, params: &LtiLaunchParams) -> Option<String> {
        let next = params.get_non_empty(keys::CUSTOM_NEXT)?;
        let link = self.links.parse(next)?;
        let path = link.checkout_path();
        (!path.is_empty()).then(|| path.to_string())
    }

    fn query_one(&self, sql: &str, args: impl rusqlite::Params) -> Result<Option<LtiSession>> {
        let row = self
            .conn
            .query_row(sql, args, SessionRow::from_row)
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }
}

fn required<'a>(params: &'a LtiLaunchParams, field: &'static str) -> Result<&'a str> {
    params
        .get_non_empty(field)
        .ok_or(StoreError::MissingField { field })
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading sessions before decoding the
/// `lti_params` JSON column.
struct SessionRow {
    id: i64,
    resource_link_id: String,
    user_id: String,
    oauth_consumer_key: String,
    checkout_location: Option<String>,
    lti_params: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            resource_link_id: row.get(1)?,
            user_id: row.get(2)?,
            oauth_consumer_key: row.get(3)?,
            checkout_location: row.get(4)?,
            lti_params: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_session(self) -> Result<LtiSession> {
        let lti_params: LtiLaunchParams =
            serde_json::from_str(&self.lti_params).map_err(StoreError::InvalidParams)?;
        Ok(LtiSession {
            id: self.id,
            resource_link_id: self.resource_link_id,
            user_id: self.user_id,
            oauth_consumer_key: self.oauth_consumer_key,
            checkout_location: self.checkout_location,
            lti_params,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
