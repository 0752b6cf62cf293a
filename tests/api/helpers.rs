//! tests/api/helpers.rs

use anyhow::Error;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};
use async_once_cell::OnceCell;
use fake::faker::name::fr_fr::{FirstName, LastName};
use fake::Fake;
use lazy_static::lazy_static;
use miolingo::configuration::{get_configuration, DatabaseSettings, Settings};
use miolingo::email_client::{EmailClient, MailMessage};
use miolingo::startup::{get_connection_pool, Application};
use miolingo::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // We cannot assign the output of `get_subscriber` to a variable based on the
    // value TEST_LOG` because the sink is part of the type returned by
    // `get_subscriber`, therefore they are not the same type.
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

lazy_static! {
    static ref CLEANUP_DB: OnceCell<Result<(), Error>> = OnceCell::new();
}

pub struct TestUser {
    pub user_id: Uuid,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl TestUser {
    pub fn generate() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: format!("{}@miolingo.com", Uuid::new_v4()),
            password: Uuid::new_v4().to_string(),
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
        }
    }

    pub fn fullname(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn store(&self, pool: &PgPool, is_verified: bool, is_superuser: bool) {
        let salt = SaltString::generate(&mut rand::thread_rng());
        // We don't care about the exact Argon2 parameters here
        // given that it's for testing purposes!
        let password_hash = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(15_000, 2, 1, None).unwrap(),
        )
        .hash_password(self.password.as_bytes(), &salt)
        .unwrap()
        .to_string();
        sqlx::query(
            "INSERT INTO users (id, email, hashed_password, is_active, is_superuser, is_verified, first_name, last_name)
            VALUES ($1, $2, $3, TRUE, $4, $5, $6, $7)",
        )
        .bind(self.user_id)
        .bind(&self.email)
        .bind(password_hash)
        .bind(is_superuser)
        .bind(is_verified)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .execute(pool)
        .await
        .expect("Failed to create test user.");
    }

    pub async fn login(&self, app: &TestApp) -> reqwest::Response {
        app.post_login(&self.email, &self.password).await
    }

    /// log in and return the bearer token
    pub async fn token(&self, app: &TestApp) -> String {
        let response = self.login(app).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_owned()
    }

    pub fn register_body(&self) -> serde_json::Value {
        serde_json::json!({
            "email": &self.email,
            "password": &self.password,
            "first_name": &self.first_name,
            "last_name": &self.last_name,
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_prefix: String,
    pub db_pool: PgPool,
    pub test_user: TestUser,
    pub api_client: reqwest::Client,
    pub email_client: EmailClient,
    pub frontend_base_url: String,
    pub db_name: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.address, self.api_prefix, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.api_client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_json<Body>(&self, path: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn patch_json<Body>(&self, path: &str, token: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_register<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.post_json("/auth/register", body).await
    }

    /// helper for sending a form encoded POST /auth/login request
    pub async fn post_login(&self, email: &str, password: &str) -> reqwest::Response {
        self.api_client
            .post(self.url("/auth/login"))
            // This 'reqwest' method makes sure that the body is URL-encoded
            // and the 'Content-Type' header is set accordingly.
            .form(&[("username", email), ("password", password)])
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_logout(&self, token: Option<&str>) -> reqwest::Response {
        let mut request = self.api_client.post(self.url("/auth/logout"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_request_verify_token(&self, email: &str) -> reqwest::Response {
        self.post_json(
            "/auth/verify/request-token",
            &serde_json::json!({ "email": email }),
        )
        .await
    }

    pub async fn post_verify(&self, token: &str) -> reqwest::Response {
        self.post_json("/auth/verify/verify", &serde_json::json!({ "token": token }))
            .await
    }

    pub async fn post_forgot_password(&self, email: &str) -> reqwest::Response {
        self.post_json(
            "/auth/reset/forgot-password",
            &serde_json::json!({ "email": email }),
        )
        .await
    }

    pub async fn post_reset_password(&self, token: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/reset/reset-password",
            &serde_json::json!({ "token": token, "password": password }),
        )
        .await
    }

    pub async fn get_me(&self, token: Option<&str>) -> reqwest::Response {
        self.get("/users/me", token).await
    }

    /// messages recorded by the outbox transport
    pub fn outbox(&self) -> Vec<MailMessage> {
        self.email_client.outbox()
    }

    /// Extract the links embedded in a mail.
    pub fn get_mail_links(&self, message: &MailMessage) -> MailLinks {
        let document = Html::parse_document(&message.html_body);
        let selector = Selector::parse("a").unwrap();
        let hrefs: Vec<_> = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .collect();
        assert_eq!(hrefs.len(), 1);
        let html = Url::parse(hrefs[0]).unwrap();
        // Let's make sure we don't link to random sites
        assert!(html.as_str().starts_with(&self.frontend_base_url));

        let plain_text = message.alternative_body.as_deref().map(|body| {
            let links: Vec<_> = linkify::LinkFinder::new()
                .links(body)
                .filter(|l| *l.kind() == linkify::LinkKind::Url)
                .collect();
            assert_eq!(links.len(), 1);
            Url::parse(links[0].as_str()).unwrap()
        });
        MailLinks { html, plain_text }
    }

    pub async fn set_user_flag(&self, user_id: Uuid, flag: &str, value: bool) {
        self.db_pool
            .execute(
                sqlx::query(&format!("UPDATE users SET {} = $1 WHERE id = $2", flag))
                    .bind(value)
                    .bind(user_id),
            )
            .await
            .expect("Failed to update user flag.");
    }
}

/// Links found in the html body and in the plain text alternative of a mail.
#[derive(PartialEq, Eq, Debug)]
pub struct MailLinks {
    pub html: Url,
    pub plain_text: Option<Url>,
}

impl MailLinks {
    pub fn token(&self) -> String {
        self.html
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .expect("No token in link.")
    }
}

pub fn assert_detail(body: &serde_json::Value, detail: serde_json::Value) {
    assert_eq!(body, &serde_json::json!({ "detail": detail }));
}

/// Spin up an instance of our application
/// and returns its address (i.e. http://localhost:XXXX)
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like `spawn_app`, with `customize` applied to the test configuration.
pub async fn spawn_app_with(customize: impl FnOnce(&mut Settings)) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);
    if let Err(r) = CLEANUP_DB.get_or_init(cleanup_db()).await {
        panic!("clean up of test databases failed:\n{}", r);
    }

    // Randomise configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // use different database for each test case
        c.database.database_name = Uuid::new_v4().to_string();
        // use a random OS port
        c.application.port = 0;
        // keep mails in memory
        c.email.suppress_send = true;
        customize(&mut c);
        c
    };

    // Create and migrate the database
    configure_database(&configuration.database).await;

    let application = Application::build(configuration.clone())
        .await
        .expect("Failed to build application");
    let application_port = application.port();
    let email_client = application.email_client();
    let _ = tokio::spawn(application.run_until_stopped());

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let test_app = TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        api_prefix: configuration.application.api_prefix.clone(),
        db_pool: get_connection_pool(&configuration.database),
        test_user: TestUser::generate(),
        api_client: client,
        email_client,
        frontend_base_url: configuration.frontend.base_url.clone(),
        db_name: configuration.database.database_name,
    };
    test_app.test_user.store(&test_app.db_pool, true, false).await;
    test_app
}

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");

    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.database_name).as_str())
        .await
        .expect("Failed to create database.");

    // Migrate database
    let connection_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");

    connection_pool
}

async fn cleanup_db() -> Result<(), Error> {
    let database = get_configuration()?.database;
    // Connect to postgres without db
    let mut connection = PgConnection::connect_with(&database.without_db()).await?;

    let rows = connection
        .fetch_all("SELECT datname FROM pg_database WHERE datistemplate = false")
        .await?;

    for row in rows {
        let database_name: String = row.try_get("datname")?;
        if Uuid::parse_str(&database_name).is_ok() {
            // database is Uuid -> test database -> delete it
            let query: &str = &format!(r#"DROP DATABASE IF EXISTS "{}" ( FORCE ) "#, database_name);
            connection.execute(query).await?;
        }
    }
    Ok(())
}
