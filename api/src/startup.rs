use crate::adapters::{
    DynamoDbSubscriberRepository, InMemorySubscriberRepository, PostmarkEmailClient,
};
use crate::configuration::{make_region_provider, DatabaseSettings, Settings};
use crate::domain::{EmailClient, SubscriberRepository};
use crate::opt_in::OptInProtocol;
use crate::routes::{confirm, health_check, subscribe};
use actix_web::dev::{Server, Service};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::web::Data;
use actix_web::{web, App, HttpMessage, HttpServer};
use anyhow::Context;
use aws_config::BehaviorVersion;
use std::net::TcpListener;
use std::sync::Arc;
use telemetry::CustomLevelRootSpanBuilder;
use tracing_actix_web::{RequestId, TracingLogger};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let repository = build_subscriber_repository(&configuration.database).await;

        Self::build_with(configuration, repository).await
    }

    /// Builds the server around an already constructed subscriber store.
    pub async fn build_with(
        configuration: Settings,
        repository: Arc<dyn SubscriberRepository>,
    ) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(format!(
            "{}:{}",
            configuration.application.host_name, configuration.application.application_port
        ))?;
        let port = listener.local_addr()?.port();

        let protocol = build_opt_in_protocol(&configuration, repository)?;
        let server = run(listener, protocol)?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn build_opt_in_protocol(
    configuration: &Settings,
    repository: Arc<dyn SubscriberRepository>,
) -> Result<OptInProtocol, anyhow::Error> {
    let sender = configuration
        .email_settings
        .sender()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid sender email address.")?;
    let email_client: Arc<dyn EmailClient> = Arc::new(
        PostmarkEmailClient::new(
            configuration.email_settings.base_url.clone(),
            sender,
            configuration.email_settings.authorization_token.clone(),
            configuration.email_settings.timeout(),
        )
        .context("Failed to build the email HTTP client.")?,
    );

    let opt_in_config = configuration
        .opt_in_config()
        .context("Invalid opt-in settings.")?;

    Ok(OptInProtocol::new(repository, email_client, opt_in_config))
}

pub async fn build_subscriber_repository(
    db_settings: &DatabaseSettings,
) -> Arc<dyn SubscriberRepository> {
    if db_settings.use_in_memory {
        tracing::warn!("Using the in-memory subscriber store, records are lost on restart");
        return Arc::new(InMemorySubscriberRepository::default());
    }

    let client = get_dynamodb_client(db_settings).await;
    Arc::new(DynamoDbSubscriberRepository::new(
        client,
        db_settings.table_name.clone(),
    ))
}

pub async fn get_dynamodb_client(db_settings: &DatabaseSettings) -> aws_sdk_dynamodb::Client {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(make_region_provider())
        .load()
        .await;

    let conf_builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
    let conf = match db_settings.use_local {
        true => conf_builder
            .endpoint_url(db_settings.local_endpoint.clone())
            .build(),
        false => conf_builder.build(),
    };

    aws_sdk_dynamodb::Client::from_conf(conf)
}

fn run(listener: TcpListener, protocol: OptInProtocol) -> Result<Server, anyhow::Error> {
    let protocol = Data::new(protocol);

    let server = HttpServer::new(move || {
        App::new()
            .wrap_fn(|req, srv| {
                let request_id = req.extensions().get::<RequestId>().copied();
                let res = srv.call(req);
                async move {
                    let mut res = res.await?;
                    if let Some(request_id) = request_id {
                        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                            res.headers_mut()
                                .insert(HeaderName::from_static("x-request-id"), value);
                        }
                    }
                    Ok(res)
                }
            })
            .wrap(TracingLogger::<CustomLevelRootSpanBuilder>::new())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(subscribe))
            .route("/subscriptions/confirm", web::get().to(confirm))
            .route("/subscriptions/confirm", web::post().to(confirm))
            .app_data(protocol.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
