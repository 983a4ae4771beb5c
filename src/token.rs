use std::time::Duration;

use base64::{engine::general_purpose, Engine};
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::{config::AuthConfig, error::AppError, model::CurrentUser};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies HS256 access tokens with the shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl: config.access_token_ttl,
        }
    }

    pub fn issue_access_token(
        &self,
        user: &CurrentUser,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<CurrentUser, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(CurrentUser {
            id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

/// Generates a refresh token for `user` and stores it so `/api/token` can
/// check it later.
pub async fn issue_refresh_token(
    db: &Pool<Sqlite>,
    user: &CurrentUser,
) -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Provider("failed to generate refresh token".to_string()))?;
    let token = general_purpose::URL_SAFE_NO_PAD.encode(bytes);

    sqlx::query(
        "INSERT INTO refresh_tokens (token, user_id, username, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token)
    .bind(&user.id)
    .bind(&user.username)
    .bind(get_current_timestamp() as i64)
    .execute(db)
    .await?;

    Ok(token)
}

/// Resolves the user a refresh token was issued to. The token must exist and
/// belong to `user_id`.
pub async fn validate_refresh_token(
    db: &Pool<Sqlite>,
    user_id: &str,
    token: &str,
) -> Result<CurrentUser, AppError> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT user_id, username FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(db)
            .await?;

    match row {
        Some((id, username)) if id == user_id => Ok(CurrentUser { id, username }),
        _ => Err(AppError::Unauthorized("invalid refresh token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            enabled: true,
            jwt_secret: secret.to_string(),
            access_token_ttl: Duration::from_secs(60),
        })
    }

    fn alice() -> CurrentUser {
        CurrentUser {
            id: "1".to_string(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn verifies_its_own_tokens() {
        let issuer = issuer("secret");
        let token = issuer.issue_access_token(&alice()).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), alice());
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let issuer = TokenIssuer::new(&AuthConfig {
            enabled: true,
            jwt_secret: "secret".to_string(),
            access_token_ttl: Duration::from_secs(u64::MAX),
        });
        assert!(issuer.issue_access_token(&alice()).is_ok());
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let token = issuer("secret").issue_access_token(&alice()).unwrap();
        assert!(issuer("other").verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: "1".into(),
            username: "alice".into(),
            iat: now - 3600,
            exp: now - 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(issuer("secret").verify(&token).is_err());
    }

    #[tokio::test]
    async fn refresh_token_is_bound_to_its_user() {
        let db = memory_pool().await;
        let token = issue_refresh_token(&db, &alice()).await.unwrap();

        let user = validate_refresh_token(&db, "1", &token).await.unwrap();
        assert_eq!(user, alice());

        assert!(matches!(
            validate_refresh_token(&db, "2", &token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            validate_refresh_token(&db, "1", "unknown").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_are_unique() {
        let db = memory_pool().await;
        let first = issue_refresh_token(&db, &alice()).await.unwrap();
        let second = issue_refresh_token(&db, &alice()).await.unwrap();
        assert_ne!(first, second);
    }
}
