use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use backend::handler::handle_verify;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use signup::configuration::get_configuration;
use signup::startup::{build_opt_in_protocol, build_subscriber_repository};
use telemetry::{get_subscriber, init_subscriber, init_tracer};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let configuration = get_configuration().await?;

    let tracer_provider = init_tracer(&configuration.telemetry)?;
    let subscriber = get_subscriber(
        configuration.telemetry.dataset_name.clone(),
        "info".into(),
        std::io::stdout,
        &configuration.telemetry,
        &tracer_provider,
    );
    init_subscriber(subscriber);

    let repository = build_subscriber_repository(&configuration.database).await;
    let protocol = build_opt_in_protocol(&configuration, repository)?;

    run(service_fn(|event: LambdaEvent<ApiGatewayProxyRequest>| {
        let protocol = protocol.clone();
        let tracer_provider = tracer_provider.clone();

        async move {
            let response = handle_verify(&protocol, &event.payload).await;
            // Spans must leave the sandbox before it is frozen.
            tracer_provider.force_flush();
            Ok::<_, Error>(response)
        }
    }))
    .await
}
