//! Session-correlation store.
//!
//! Records every LTI launch keyed by (resource_link_id, user_id) in SQLite,
//! together with the checkout path derived from the launch's `custom_next`
//! link, and answers "which launch opened this file?" for the notebook
//! server.
//!
//! | Module   | Responsibility                                           |
//! |----------|----------------------------------------------------------|
//! | `models` | `LtiLaunchParams`, `LtiSession`, well-known param keys   |
//! | `db`     | `SessionDb` (rusqlite) and the async `DbHandle` wrapper  |

pub mod db;
pub mod models;

pub use db::{DbHandle, SessionDb, StoreOptions};
pub use models::{LtiLaunchParams, LtiSession, keys};
