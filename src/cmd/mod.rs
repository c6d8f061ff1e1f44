//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                          |
//! |-----------|-------------------------------------------|
//! | `store`   | `Init`, `Record`, `Resolve`, `Sessions`   |
//! | `grade`   | `Grade`                                   |
//! | `bridge`  | `Exec`, `Env`                             |
//! | `serve`   | `Serve`                                   |
//! | `config`  | `Config`                                  |

pub mod bridge;
pub mod config;
pub mod grade;
pub mod serve;
pub mod store;

pub use bridge::{cmd_env, cmd_exec};
pub use config::cmd_config;
pub use grade::cmd_grade;
pub use serve::cmd_serve;
pub use store::{cmd_init, cmd_record, cmd_resolve, cmd_sessions};
