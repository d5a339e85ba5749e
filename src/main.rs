use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commitment_engine::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  let json = std::env::var("LOG_JSON").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);

  if json {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(tracing_subscriber::fmt::layer().json())
      .init();
  } else {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(tracing_subscriber::fmt::layer())
      .init();
  }

  let config = AppConfig::from_env()?;
  commitment_engine::run(config).await
}
