use axum::{Router, body::Body, extract::Request, response::Response};
use fake::{Fake, faker::internet::en::SafeEmail};
use moodtoon::{
    auth::encode_jwt,
    config::Config,
    db::user::create_user,
    model::User,
    routes::init_router,
    state::AppState,
};
use secrecy::SecretString;
use sqlx::{Connection, Executor, PgConnection, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower::ServiceExt;
use uuid::Uuid;

pub struct AppStateTest {
    pub app_state: AppState,
}

impl AppStateTest {
    /// Without a database the pool is lazy and never connects, which is
    /// enough for routes that fail before touching storage.
    pub async fn new(with_db: bool) -> Self {
        let mut config = Config::new().expect("Failed to read configuration");
        config.application.run_migration = false;

        if with_db {
            config.database.database_name = Uuid::new_v4().to_string();
            create_database(&config).await;
        }

        let app_state = AppState::init(config)
            .await
            .expect("Failed to build app state");

        if with_db {
            sqlx::migrate!("./migrations")
                .run(&app_state.pool)
                .await
                .expect("Failed to migrate the database");
        }

        Self { app_state }
    }

    pub fn router(&self) -> Router {
        init_router(self.app_state.clone())
    }

    /// Serve the router on a random local port and return its base url.
    pub async fn spawn(&self) -> String {
        serve_on_random_port(self.router()).await
    }

    pub async fn generate_response(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn create_user(&self) -> (User, String) {
        let email: String = SafeEmail().fake();
        let password = "password".to_string();

        let user = create_user(
            &self.app_state.pool,
            email,
            SecretString::from(password.clone()),
        )
        .await
        .expect("Failed to create user");

        (user, password)
    }

    pub async fn generate_jwt_with_user(&self) -> (User, String) {
        let (user, _) = self.create_user().await;
        let token = encode_jwt(&user.id, &self.app_state.config.jwt).unwrap();

        (user, token)
    }
}

async fn create_database(config: &Config) {
    let mut connection = PgConnection::connect_with(&config.database.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.database.database_name).as_str())
        .await
        .expect("Failed to create database.");

    // Fail early when the new database is unreachable.
    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(config.database.with_db())
        .await
        .expect("Failed to connect to the new database");
}

pub async fn serve_on_random_port(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move { axum::serve(listener, router).await });

    address
}
