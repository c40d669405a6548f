use anyhow::Context;
use signup::configuration::get_configuration;
use signup::signup_form::SignupForm;
use telemetry::{get_subscriber, init_subscriber, init_tracer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let email = std::env::args()
        .nth(1)
        .context("Usage: submit_signup <email>")?;

    let configuration = get_configuration()
        .await
        .context("Failed to read configuration")?;

    let tracer_provider = init_tracer(&configuration.telemetry)?;
    let subscriber = get_subscriber(
        "submit_signup".into(),
        "warn".into(),
        std::io::stderr,
        &configuration.telemetry,
        &tracer_provider,
    );
    init_subscriber(subscriber);

    let form = SignupForm::new(&configuration.form).context("Failed to build the HTTP client")?;
    let outcome = form.submit(&email).await;
    tracer_provider.force_flush();

    println!("{}", outcome.message());
    if !outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
