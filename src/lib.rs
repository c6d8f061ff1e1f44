pub mod bridge;
pub mod config;
pub mod errors;
pub mod launch;
pub mod link;
pub mod logging;
pub mod outcome;
pub mod resolver;
pub mod server;
pub mod store;
