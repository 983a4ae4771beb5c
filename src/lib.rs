use std::sync::Arc;

use sqlx::{Pool, Sqlite};

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
pub mod schema;
pub mod storage;
pub mod token;

use config::AuthConfig;
use credentials::CredentialManager;
use storage::UploadUrlSigner;
use token::TokenIssuer;

// Struct representing the application state shared by every handler
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub auth: AuthConfig,
    pub tokens: TokenIssuer,
    pub credentials: Arc<dyn CredentialManager>,
    pub uploads: Arc<dyn UploadUrlSigner>,
}

impl AppState {
    pub fn new(
        db: Pool<Sqlite>,
        auth: AuthConfig,
        credentials: Arc<dyn CredentialManager>,
        uploads: Arc<dyn UploadUrlSigner>,
    ) -> Self {
        Self {
            tokens: TokenIssuer::new(&auth),
            db,
            auth,
            credentials,
            uploads,
        }
    }
}
