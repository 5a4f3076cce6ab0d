use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{IssuedTokens, LoginRequest, RegisterRequest, User, UserProfile};

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 3600;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 2_592_000; // 30 days

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService) -> Self {
        let access_token_ttl_seconds = std::env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECONDS);

        let refresh_token_ttl_seconds = std::env::var("JWT_REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_SECONDS);

        Self {
            mongo,
            jwt_service,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        }
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.mongo.collection("users")
    }

    fn refresh_tokens(&self) -> mongodb::Collection<RefreshToken> {
        self.mongo.collection("refresh_tokens")
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<IssuedTokens, ApiError> {
        let existing = self.users().find_one(doc! { "email": &req.email }).await?;
        if existing.is_some() {
            return Err(ApiError::Conflict(
                "User with this email already exists.".to_string(),
            ));
        }

        let password_hash = hash(&req.password, DEFAULT_COST)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;

        let now = Utc::now();
        let user = User {
            id: None,
            email: req.email.clone(),
            password_hash,
            name: req.name,
            roles: vec!["user".to_string()],
            is_active: true,
            created_at: now,
            last_login_at: None,
        };

        // The unique email index closes the check-then-insert race.
        let inserted = match self.users().insert_one(&user).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(ApiError::Conflict(
                    "User with this email already exists.".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let user_id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Inserted user has no ObjectId")))?;

        tracing::info!(user_id = %user_id.to_hex(), email = %req.email, "User registered");

        let access_token = self.generate_access_token(&user_id, &user.roles)?;
        let refresh_token = self.create_refresh_token(&user_id).await?;

        let mut user = user;
        user.id = Some(user_id);

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<IssuedTokens, ApiError> {
        let user = self
            .users()
            .find_one(doc! { "email": &req.email })
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !user.is_active {
            tracing::warn!(email = %req.email, "Login attempt for disabled account");
            return Err(ApiError::Forbidden);
        }

        let password_ok = verify(&req.password, &user.password_hash)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))?;
        if !password_ok {
            tracing::warn!(email = %req.email, "Failed login attempt");
            return Err(ApiError::Unauthorized);
        }

        let user_id = user
            .id
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Stored user has no ObjectId")))?;

        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "last_login_at": mongodb::bson::DateTime::now() } },
            )
            .await?;

        let access_token = self.generate_access_token(&user_id, &user.roles)?;
        let refresh_token = self.create_refresh_token(&user_id).await?;

        tracing::info!(user_id = %user_id.to_hex(), "Successful login");

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    /// Exchanges a valid refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let token_hash = hash_token(refresh_token);

        let token_doc = self
            .refresh_tokens()
            .find_one(doc! { "token_hash": &token_hash, "revoked": false })
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if token_doc.expires_at < Utc::now() {
            return Err(ApiError::Unauthorized);
        }

        let user = self
            .users()
            .find_one(doc! { "_id": token_doc.user_id })
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !user.is_active {
            return Err(ApiError::Forbidden);
        }

        let user_id = user
            .id
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Stored user has no ObjectId")))?;
        self.generate_access_token(&user_id, &user.roles)
    }

    /// Revokes the refresh token. Idempotent: revoking an unknown or
    /// already-revoked token succeeds silently.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let token_hash = hash_token(refresh_token);

        self.refresh_tokens()
            .update_one(
                doc! { "token_hash": &token_hash },
                doc! { "$set": { "revoked": true } },
            )
            .await?;

        Ok(())
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        let object_id = ObjectId::parse_str(user_id).map_err(|_| ApiError::Unauthorized)?;

        self.users()
            .find_one(doc! { "_id": object_id })
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))
    }

    fn generate_access_token(
        &self,
        user_id: &ObjectId,
        roles: &[String],
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_hex(),
            roles: roles.to_vec(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(claims)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to generate token: {}", e)))
    }

    async fn create_refresh_token(&self, user_id: &ObjectId) -> Result<String, ApiError> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();

        let refresh_token = RefreshToken {
            id: None,
            user_id: *user_id,
            token_hash: hash_token(&token),
            created_at: now,
            expires_at: now + Duration::seconds(self.refresh_token_ttl_seconds),
            revoked: false,
        };

        self.refresh_tokens().insert_one(&refresh_token).await?;

        Ok(token)
    }
}

/// Refresh tokens are stored hashed; a database leak does not leak sessions.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *e.kind
    {
        return we.code == 11000;
    }
    false
}
