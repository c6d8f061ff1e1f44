//! HTTP service command: `ltipass serve`.

use anyhow::Result;

use ltipass::config::LtipassConfig;
use ltipass::server::{ServerConfig, start_server};

pub async fn cmd_serve(config: &LtipassConfig) -> Result<()> {
    for warning in config.validate() {
        eprintln!("warning: {}", warning);
    }
    start_server(ServerConfig::from_config(config)).await
}
