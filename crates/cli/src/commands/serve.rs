//! `parley serve`: start the HTTP API server.

use parley_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Parley gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   History:   {}", config.history.backend);
    println!("   Retrieval: {}", if config.rag.enabled { "on" } else { "off" });

    parley_gateway::start(config).await?;

    Ok(())
}
