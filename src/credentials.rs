use std::num::NonZeroU32;

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::AuthFlowType;
use base64::{engine::general_purpose, Engine};
use ring::{
    digest, hmac, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use sqlx::{Pool, Sqlite};
use thiserror::Error;

use crate::{config::CognitoConfig, model::CurrentUser};

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = digest::SHA256_OUTPUT_LEN;

// Verified against when the username is unknown, so both paths cost one
// PBKDF2 run.
const DUMMY_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAA==$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user {0} already exists")]
    UserExists(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Provider(String),
}

/// Verifies a username/password pair and resolves the identity behind it.
#[async_trait]
pub trait CredentialManager: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<CurrentUser, AuthError>;
}

/// Users stored in the local `users` table with PBKDF2 password hashes.
#[derive(Clone)]
pub struct LocalCredentials {
    db: Pool<Sqlite>,
}

impl LocalCredentials {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let password = password.to_owned();
        let password_hash = run_blocking(move || hash_password(&password)).await??;

        let result: Result<(i64,), sqlx::Error> =
            sqlx::query_as("INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING user_id")
                .bind(username)
                .bind(password_hash)
                .fetch_one(&self.db)
                .await;

        match result {
            Ok((user_id,)) => {
                tracing::info!(username, user_id, "created user");
                Ok(CurrentUser {
                    id: user_id.to_string(),
                    username: username.to_string(),
                })
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::UserExists(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialManager for LocalCredentials {
    async fn authenticate(&self, username: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT user_id, password_hash FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.db)
                .await?;

        let (user_id, stored) = match row {
            Some((user_id, stored)) => (Some(user_id), stored),
            None => (None, DUMMY_HASH.to_string()),
        };

        let password = password.to_owned();
        let verified = run_blocking(move || verify_password(&password, &stored)).await?;

        match user_id {
            Some(user_id) if verified => Ok(CurrentUser {
                id: user_id.to_string(),
                username: username.to_string(),
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

// PBKDF2 work runs on the blocking pool, never on an async worker.
async fn run_blocking<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AuthError::Provider(format!("password hashing task failed: {err}")))
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| AuthError::Provider("failed to generate password salt".to_string()))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations(),
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "{}${}",
        general_purpose::STANDARD.encode(salt),
        general_purpose::STANDARD.encode(hash)
    ))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, hash)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (
        general_purpose::STANDARD.decode(salt),
        general_purpose::STANDARD.decode(hash),
    ) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations(),
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

/// Delegates verification to an AWS Cognito user pool app client.
pub struct CognitoCredentials {
    client: aws_sdk_cognitoidentityprovider::Client,
    client_id: String,
    client_secret: String,
}

impl CognitoCredentials {
    pub fn new(client: aws_sdk_cognitoidentityprovider::Client, config: CognitoConfig) -> Self {
        Self {
            client,
            client_id: config.client_id,
            client_secret: config.client_secret,
        }
    }
}

#[async_trait]
impl CredentialManager for CognitoCredentials {
    async fn authenticate(&self, username: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let secret_hash = generate_secret_hash(&self.client_secret, username, &self.client_id);

        let response = self
            .client
            .initiate_auth()
            .client_id(&self.client_id)
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", secret_hash)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_not_authorized_exception() || err.is_user_not_found_exception() {
                    AuthError::InvalidCredentials
                } else {
                    AuthError::Provider(err.to_string())
                }
            })?;

        // A challenge (e.g. NEW_PASSWORD_REQUIRED) comes back without tokens.
        let access_token = response
            .authentication_result()
            .and_then(|result| result.access_token())
            .ok_or_else(|| AuthError::Provider("cognito returned no access token".to_string()))?;

        let user = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|err| AuthError::Provider(err.into_service_error().to_string()))?;

        let id = user
            .user_attributes()
            .iter()
            .find(|attribute| attribute.name() == "sub")
            .and_then(|attribute| attribute.value())
            .unwrap_or(user.username());

        Ok(CurrentUser {
            id: id.to_string(),
            username: user.username().to_string(),
        })
    }
}

fn generate_secret_hash(client_secret: &str, user_name: &str, client_id: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, client_secret.as_bytes());
    let msg = [user_name.as_bytes(), client_id.as_bytes()].concat();

    let signature = hmac::sign(&key, &msg);

    general_purpose::STANDARD.encode(signature.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[test]
    fn secret_hash_matches_cognito_format() {
        assert_eq!(
            generate_secret_hash("client-secret", "alice", "client-id"),
            "qROqM+PMKX09MK8ulDVm8LCWdCRqQQEUG9HcF+N7/S4="
        );
    }

    #[test]
    fn password_hashes_are_salted() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
        assert!(!verify_password("hunter3", &first));
    }

    #[test]
    fn dummy_hash_is_well_formed_but_matches_nothing() {
        let (salt, hash) = DUMMY_HASH.split_once('$').unwrap();
        assert_eq!(general_purpose::STANDARD.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(general_purpose::STANDARD.decode(hash).unwrap().len(), HASH_LEN);
        assert!(!verify_password("", DUMMY_HASH));
        assert!(!verify_password("wonderland", DUMMY_HASH));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn login_does_not_stall_the_runtime() {
        let credentials = LocalCredentials::new(memory_pool().await);
        credentials.create_user("alice", "wonderland").await.unwrap();

        for username in ["alice", "nobody"] {
            let login = credentials.authenticate(username, "wonderland");
            tokio::pin!(login);

            tokio::select! {
                biased;
                _ = tokio::time::sleep(std::time::Duration::from_millis(2)) => {}
                _ = &mut login => panic!("{username}: login finished before a 2ms timer on the same thread"),
            }

            let outcome = login.await;
            assert_eq!(outcome.is_ok(), username == "alice");
        }
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("pw", "no-separator"));
        assert!(!verify_password("pw", "!!!$???"));
    }

    #[tokio::test]
    async fn local_users_authenticate() {
        let credentials = LocalCredentials::new(memory_pool().await);
        let created = credentials.create_user("alice", "wonderland").await.unwrap();

        let user = credentials.authenticate("alice", "wonderland").await.unwrap();
        assert_eq!(user, created);

        assert!(matches!(
            credentials.authenticate("alice", "looking-glass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            credentials.authenticate("bob", "wonderland").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let credentials = LocalCredentials::new(memory_pool().await);
        credentials.create_user("alice", "a").await.unwrap();

        assert!(matches!(
            credentials.create_user("alice", "b").await,
            Err(AuthError::UserExists(name)) if name == "alice"
        ));
    }
}
