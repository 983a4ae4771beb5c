use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Server,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use todo_api::{
    config::{AuthProvider, Config},
    credentials::{AuthError, CognitoCredentials, CredentialManager, LocalCredentials},
    db,
    route::create_router,
    storage::S3Presigner,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("todo_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::init_schema(&pool).await?;
    tracing::info!("database schema ready");

    let local = LocalCredentials::new(pool.clone());
    if let Some((username, password)) = &config.seed_user {
        match local.create_user(username, password).await {
            Ok(_) => {}
            Err(AuthError::UserExists(_)) => {
                tracing::info!(%username, "seed user already exists");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let credentials: Arc<dyn CredentialManager> = match (config.provider, config.cognito.clone()) {
        (AuthProvider::Cognito, Some(cognito)) => {
            tracing::info!("verifying credentials against cognito");
            Arc::new(CognitoCredentials::new(
                aws_sdk_cognitoidentityprovider::Client::new(&aws),
                cognito,
            ))
        }
        _ => Arc::new(local),
    };
    let uploads = Arc::new(S3Presigner::new(
        aws_sdk_s3::Client::new(&aws),
        config.upload_url_ttl,
    ));

    let app_state = Arc::new(AppState::new(
        pool,
        config.auth.clone(),
        credentials,
        uploads,
    ));

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!(addr = %config.addr, "server started");

    Server::bind(&config.addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
