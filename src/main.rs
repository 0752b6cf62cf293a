//! main.rs

use miolingo::configuration::{get_configuration, LogHandler};
use miolingo::startup::Application;
use miolingo::telemetry::{get_subscriber, init_subscriber, LoggerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Panic if we can't read configuration
    let configuration = get_configuration().expect("Failed to read configuration.");

    let logger_config = LoggerConfig::default().override_with(&configuration.log);
    let directives = logger_config.filter_directives();
    if configuration.log.handlers.contains(&LogHandler::Console) {
        init_subscriber(get_subscriber("miolingo".into(), directives, std::io::stdout));
    } else {
        init_subscriber(get_subscriber("miolingo".into(), directives, std::io::sink));
    }

    let application = Application::build(configuration).await?;
    tracing::info!(port = application.port(), "Miolingo is listening.");
    application.run_until_stopped().await?;
    Ok(())
}
