use anyhow::Context;
use signup::configuration::get_configuration;
use signup::startup::Application;
use telemetry::{get_subscriber, init_subscriber, init_tracer};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration()
        .await
        .context("Failed to read configuration")?;

    let tracer_provider = init_tracer(&configuration.telemetry)?;
    let subscriber = get_subscriber(
        configuration.telemetry.dataset_name.clone(),
        "info".into(),
        std::io::stdout,
        &configuration.telemetry,
        &tracer_provider,
    );
    init_subscriber(subscriber);

    let application = Application::build(configuration).await?;
    tracing::info!(port = application.port(), "Listening for signups");

    let outcome = application.run_until_stopped().await;
    tracer_provider.force_flush();
    outcome?;

    Ok(())
}
