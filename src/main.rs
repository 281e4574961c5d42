use tracing_subscriber::EnvFilter;

use mesh_agent::{Agent, AgentConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = Agent::new(AgentConfig::default()).run().await {
        tracing::error!(err = %err, "agent exited with error");
        std::process::exit(1);
    }
}
