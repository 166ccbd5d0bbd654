//! Token signing for the two trust domains.
//!
//! User tokens and service tokens are signed with different secrets, carry
//! different issuers and have different claim shapes. Each domain has its own
//! decoder; a token from one domain never decodes in the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::error::AuthError;
use crate::config::JwtConfig;
use crate::models::{ServiceCredential, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id as a string.
    pub sub: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub level: i32,
    /// Permission snapshot at issue time.
    pub permissions: Vec<String>,
    pub iat: i64,
    /// Issue time in milliseconds, compared against the invalidation epoch.
    pub iat_ms: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceClaims {
    pub sub: String,
    pub service_id: String,
    pub service_name: String,
    pub service_type: String,
    pub allowed_apis: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// A freshly signed token and its expiry (Unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken<C> {
    pub token: String,
    pub expires_at: i64,
    pub claims: C,
}

/// Primary role snapshot stamped into a user token.
#[derive(Debug, Clone)]
pub struct RoleGrant {
    pub role: String,
    pub level: i32,
    pub permissions: Vec<String>,
}

#[derive(Clone)]
struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl Signer {
    fn new(secret: &str, issuer: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl,
        }
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<C>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Signs and verifies user-domain tokens.
#[derive(Clone)]
pub struct UserTokenService {
    signer: Signer,
}

impl UserTokenService {
    pub fn new(secret: &str, issuer: &str, ttl: Duration) -> Self {
        Self {
            signer: Signer::new(secret, issuer, ttl),
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.user_secret,
            &config.user_issuer,
            Duration::hours(config.user_token_ttl_hours),
        )
    }

    /// `issued_at_ms` comes from the invalidation epoch so the token is never
    /// stamped earlier than the current epoch.
    pub fn issue(
        &self,
        user: &User,
        grant: RoleGrant,
        issued_at_ms: i64,
    ) -> Result<IssuedToken<UserClaims>, AuthError> {
        let iat = issued_at_ms.div_euclid(1000);
        let exp = iat + self.signer.ttl.num_seconds();
        let claims = UserClaims {
            sub: user.id.to_string(),
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: grant.role,
            level: grant.level,
            permissions: grant.permissions,
            iat,
            iat_ms: issued_at_ms,
            exp,
            iss: self.signer.issuer.clone(),
        };
        let token = self.signer.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
            claims,
        })
    }

    /// Signature, issuer and expiry only. Epoch and account status are
    /// checked by the caller.
    pub fn verify(&self, token: &str) -> Result<UserClaims, AuthError> {
        self.signer.verify(token)
    }
}

/// Signs and verifies service-domain tokens.
#[derive(Clone)]
pub struct ServiceTokenService {
    signer: Signer,
}

impl ServiceTokenService {
    pub fn new(secret: &str, issuer: &str, ttl: Duration) -> Self {
        Self {
            signer: Signer::new(secret, issuer, ttl),
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.service_secret,
            &config.service_issuer,
            Duration::hours(config.service_token_ttl_hours),
        )
    }

    pub fn issue(
        &self,
        service: &ServiceCredential,
    ) -> Result<IssuedToken<ServiceClaims>, AuthError> {
        let iat = Utc::now().timestamp();
        let exp = iat + self.signer.ttl.num_seconds();
        let claims = ServiceClaims {
            sub: service.service_id.clone(),
            service_id: service.service_id.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
            allowed_apis: service.allowed_apis.clone(),
            iat,
            exp,
            iss: self.signer.issuer.clone(),
        };
        let token = self.signer.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
            claims,
        })
    }

    pub fn verify(&self, token: &str) -> Result<ServiceClaims, AuthError> {
        self.signer.verify(token)
    }
}
