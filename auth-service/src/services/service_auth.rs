use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::database::CredentialStore;
use super::error::AuthError;
use super::jwt::ServiceTokenService;
use crate::models::{ServiceTokenRecord, WILDCARD_PERMISSION};
use crate::utils::{hash_secret_digest, verify_password, Password};

/// A service token handed out by the handshake.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSession {
    pub token: String,
    pub expires_at: i64,
    pub service_id: String,
    pub service_name: String,
    pub allowed_apis: Vec<String>,
}

/// Identity carried by a validated service token.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceIdentity {
    pub service_id: String,
    pub service_name: String,
    pub service_type: String,
    pub allowed_apis: Vec<String>,
    pub expires_at: i64,
}

impl ServiceIdentity {
    pub fn may_call(&self, api_path: &str) -> bool {
        allow_list_permits(&self.allowed_apis, api_path)
    }
}

/// A lone `*` admits everything; any other entry must equal the path.
pub fn allow_list_permits(allowed_apis: &[String], api_path: &str) -> bool {
    allowed_apis
        .iter()
        .any(|api| api == WILDCARD_PERMISSION || api == api_path)
}

/// Short digest prefix safe to put in logs.
fn fingerprint(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// Service trust domain. Independent of user tokens and of the
/// invalidation epoch; a service is revoked by disabling its row.
#[derive(Clone)]
pub struct ServiceAuthService {
    store: Arc<dyn CredentialStore>,
    tokens: ServiceTokenService,
}

impl ServiceAuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: ServiceTokenService) -> Self {
        Self { store, tokens }
    }

    #[tracing::instrument(skip(self, secret))]
    pub async fn authenticate_service(
        &self,
        service_id: &str,
        secret: Password,
    ) -> Result<ServiceSession, AuthError> {
        let service = self
            .store
            .find_service(service_id)
            .await?
            .ok_or(AuthError::ServiceNotFound)?;
        if !service.is_active {
            tracing::warn!("Service login rejected: disabled");
            return Err(AuthError::ServiceDisabled);
        }

        let hash = service.secret_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&secret, &hash))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Secret check aborted: {}", e)))??;
        if !matches {
            tracing::warn!("Service login rejected: wrong secret");
            return Err(AuthError::InvalidSecret);
        }

        let issued = self.tokens.issue(&service)?;

        if let Err(e) = self.store.touch_service(service_id).await {
            tracing::warn!(error = %e, "Failed to update service last use");
        }

        let digest = hash_secret_digest(&issued.token);
        tracing::info!(token_fingerprint = %fingerprint(&digest), "Service token issued");

        let record = ServiceTokenRecord {
            service_id: service.service_id.clone(),
            token_hash: digest,
            expires_at: Utc
                .timestamp_opt(issued.expires_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        };
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_service_token(&record).await {
                tracing::warn!(
                    service_id = %record.service_id,
                    error = %e,
                    "Failed to record issued service token"
                );
            }
        });

        Ok(ServiceSession {
            token: issued.token,
            expires_at: issued.expires_at,
            service_id: service.service_id,
            service_name: service.service_name,
            allowed_apis: service.allowed_apis,
        })
    }

    /// Signature, issuer and expiry, then the current state of the service
    /// row. The allow-list comes from the token.
    pub async fn validate_service_token(&self, token: &str) -> Result<ServiceIdentity, AuthError> {
        let claims = self.tokens.verify(token)?;

        let service = self
            .store
            .find_service(&claims.service_id)
            .await?
            .ok_or(AuthError::ServiceNotFound)?;
        if !service.is_active {
            return Err(AuthError::ServiceDisabled);
        }

        Ok(ServiceIdentity {
            service_id: claims.service_id,
            service_name: claims.service_name,
            service_type: claims.service_type,
            allowed_apis: claims.allowed_apis,
            expires_at: claims.exp,
        })
    }

    /// Unknown or disabled services are denied.
    pub async fn check_service_permission(
        &self,
        service_id: &str,
        api_path: &str,
    ) -> Result<bool, AuthError> {
        match self.store.find_service(service_id).await? {
            Some(service) if service.is_active => {
                Ok(allow_list_permits(&service.allowed_apis, api_path))
            }
            Some(_) => {
                tracing::debug!(service_id = %service_id, "Permission check for disabled service");
                Ok(false)
            }
            None => {
                tracing::debug!(service_id = %service_id, "Permission check for unknown service");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockCredentialStore;
    use chrono::Duration;

    const SECRET: &str = "service-domain-secret-32-bytes!!!";

    fn setup() -> (Arc<MockCredentialStore>, ServiceAuthService) {
        let store = Arc::new(MockCredentialStore::new());
        store
            .add_service("job-service", "job-secret", &["/internal/v1/jobs/*"])
            .unwrap();
        store
            .add_service("admin-service", "admin-secret", &["*"])
            .unwrap();
        let services = ServiceAuthService::new(
            store.clone(),
            ServiceTokenService::new(SECRET, "auth-service-internal", Duration::hours(24)),
        );
        (store, services)
    }

    #[test]
    fn allow_list_is_exact_or_star() {
        let jobs = vec!["/internal/v1/jobs/*".to_string()];
        assert!(!allow_list_permits(&jobs, "/internal/v1/users/delete"));
        assert!(!allow_list_permits(&jobs, "/internal/v1/jobs/42"));
        assert!(allow_list_permits(&jobs, "/internal/v1/jobs/*"));
        assert!(allow_list_permits(&["*".to_string()], "/anything"));
        assert!(!allow_list_permits(&[], "/anything"));
    }

    #[tokio::test]
    async fn job_service_may_not_delete_users() {
        let (_, services) = setup();
        assert!(!services
            .check_service_permission("job-service", "/internal/v1/users/delete")
            .await
            .unwrap());
        assert!(services
            .check_service_permission("admin-service", "/internal/v1/users/delete")
            .await
            .unwrap());
        assert!(!services
            .check_service_permission("ghost-service", "/internal/v1/jobs/*")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn handshake_issues_token_and_records_only_its_digest() {
        let (store, services) = setup();
        let session = services
            .authenticate_service("job-service", Password::new("job-secret"))
            .await
            .unwrap();
        assert_eq!(session.allowed_apis, vec!["/internal/v1/jobs/*"]);

        let identity = services.validate_service_token(&session.token).await.unwrap();
        assert_eq!(identity.service_id, "job-service");

        for _ in 0..50 {
            if !store.service_tokens().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let records = store.service_tokens();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token_hash, hash_secret_digest(&session.token));
        assert_ne!(records[0].token_hash, session.token);
    }

    #[tokio::test]
    async fn handshake_failures_are_classified() {
        let (store, services) = setup();
        assert!(matches!(
            services
                .authenticate_service("ghost-service", Password::new("x"))
                .await,
            Err(AuthError::ServiceNotFound)
        ));
        assert!(matches!(
            services
                .authenticate_service("job-service", Password::new("wrong"))
                .await,
            Err(AuthError::InvalidSecret)
        ));
        store.set_service_active("job-service", false).unwrap();
        assert!(matches!(
            services
                .authenticate_service("job-service", Password::new("job-secret"))
                .await,
            Err(AuthError::ServiceDisabled)
        ));
    }

    #[tokio::test]
    async fn disabling_a_service_revokes_its_tokens() {
        let (store, services) = setup();
        let session = services
            .authenticate_service("job-service", Password::new("job-secret"))
            .await
            .unwrap();
        store.set_service_active("job-service", false).unwrap();
        assert!(matches!(
            services.validate_service_token(&session.token).await,
            Err(AuthError::ServiceDisabled)
        ));
    }
}
