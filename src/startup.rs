//! src/startup.rs

use crate::authentication::{reject_anonymous_users, TokenSigner};
use crate::configuration::{DatabaseSettings, Settings};
use crate::domain::ValidationError;
use crate::email_client::EmailClient;
use crate::error::Error;
use crate::routes::{
    delete_user, forgot_password, get_me, get_user, health_check, login, logout, patch_me,
    patch_user, register, request_verify_token, reset_password, verify,
};
use crate::utils::FrontendUrl;
use actix_cors::Cors;
use actix_web::middleware::Condition;
use actix_web::{dev::Server, web, web::Data, App, HttpServer};
use actix_web_lab::middleware::from_fn;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

/// Holds the newly built server and its port
pub struct Application {
    port: u16,
    server: Server,
    email_client: EmailClient,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);
        let email_client = EmailClient::new(&configuration.email.smtp_config()?)?;

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            connection_pool,
            email_client.clone(),
            &configuration,
        )?;

        Ok(Self {
            port,
            server,
            email_client,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shares its outbox with the running server when sending is suppressed.
    pub fn email_client(&self) -> EmailClient {
        self.email_client.clone()
    }

    // A more expressive name that makes it clear that
    // this function only returns when the application is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

fn malformed_body(err: impl std::fmt::Display) -> actix_web::Error {
    Error::from(ValidationError::MalformedBody(err.to_string())).into()
}

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    settings: &Settings,
) -> Result<Server, anyhow::Error> {
    let frontend = FrontendUrl::parse(&settings.frontend.base_url)
        .context("Invalid frontend base url.")?;
    // Wrap shared state in smart pointers
    let db_pool = Data::new(db_pool);
    let email_client = Data::new(email_client);
    let frontend = Data::new(frontend);
    let frontend_settings = Data::new(settings.frontend.clone());
    let tokens = Data::new(TokenSigner::new(settings.secret.clone()));
    let api_prefix = settings.application.api_prefix.clone();
    let cors_origins = settings.application.cors_origins.clone();

    let server = HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
            .allow_any_method()
            .allow_any_header();
        App::new()
            .wrap(Condition::new(!cors_origins.is_empty(), cors))
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _| malformed_body(err)))
            .app_data(web::FormConfig::default().error_handler(|err, _| malformed_body(err)))
            .service(
                web::scope(&api_prefix)
                    .route("/health_check", web::get().to(health_check))
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .service(
                                web::resource("/logout")
                                    .wrap(from_fn(reject_anonymous_users))
                                    .route(web::post().to(logout)),
                            )
                            .route(
                                "/verify/request-token",
                                web::post().to(request_verify_token),
                            )
                            .route("/verify/verify", web::post().to(verify))
                            .route(
                                "/reset/forgot-password",
                                web::post().to(forgot_password),
                            )
                            .route("/reset/reset-password", web::post().to(reset_password)),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(from_fn(reject_anonymous_users))
                            .service(
                                web::resource("/me")
                                    .route(web::get().to(get_me))
                                    .route(web::patch().to(patch_me)),
                            )
                            .service(
                                web::resource("/{user_id}")
                                    .route(web::get().to(get_user))
                                    .route(web::patch().to(patch_user))
                                    .route(web::delete().to(delete_user)),
                            ),
                    ),
            )
            .app_data(db_pool.clone())
            .app_data(email_client.clone())
            .app_data(frontend.clone())
            .app_data(frontend_settings.clone())
            .app_data(tokens.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
