//! Mock authentication service
//!
//! In-process accounts for demos and tests. Seeded with one administrator
//! account; registration adds accounts for the lifetime of the service.

use super::{AuthBackend, AuthBackendError, AuthResponse, LoginRequest, RegisterRequest};
use crate::session::{Principal, DEFAULT_ROLE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

/// Email of the seeded demo account
pub const DEMO_EMAIL: &str = "john.doe@example.com";
/// Password of the seeded demo account
pub const DEMO_PASSWORD: &str = "password123";

#[derive(Debug, Clone)]
struct Account {
    principal: Principal,
    password: String,
}

/// Mock auth service with simulated network latency
#[derive(Debug)]
pub struct MockAuthService {
    accounts: RwLock<Vec<Account>>,
    /// Issued token → principal id
    tokens: RwLock<HashMap<String, String>>,
    latency: Duration,
}

impl Default for MockAuthService {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl MockAuthService {
    /// Service with no accounts
    pub fn empty(latency: Duration) -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            tokens: RwLock::new(HashMap::new()),
            latency,
        }
    }

    /// Service seeded with the demo administrator
    pub fn new(latency: Duration) -> Self {
        let service = Self::empty(latency);
        service.add_account(
            Principal::new("1", "John Doe", DEMO_EMAIL)
                .role("Administrator")
                .avatar("/assets/avatar.jpg"),
            DEMO_PASSWORD,
        );
        service
    }

    /// Add an account directly, bypassing registration checks
    pub fn add_account(&self, principal: Principal, password: &str) {
        self.accounts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Account {
                principal,
                password: password.to_string(),
            });
    }

    /// Number of known accounts
    pub fn account_count(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }

    /// Principal owning `token`, if it was issued by this service
    pub fn verify_token(&self, token: &str) -> Option<Principal> {
        let principal_id = self.tokens.read().ok()?.get(token).cloned()?;
        self.accounts
            .read()
            .ok()?
            .iter()
            .find(|a| a.principal.id == principal_id)
            .map(|a| a.principal.clone())
    }

    /// Forget an issued token
    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens
            .write()
            .map(|mut t| t.remove(token).is_some())
            .unwrap_or(false)
    }

    fn issue_token(&self, principal: &Principal) -> String {
        let token = format!("mock-jwt-token-{}", &Uuid::new_v4().simple().to_string()[..7]);
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.clone(), principal.id.clone());
        }
        token
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuthService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthBackendError> {
        self.simulate_latency().await;

        let principal = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            accounts
                .iter()
                .find(|a| {
                    a.principal.email.eq_ignore_ascii_case(&request.email)
                        && a.password == request.password
                })
                .map(|a| a.principal.clone())
        }
        .ok_or(AuthBackendError::InvalidCredentials)?;

        let token = self.issue_token(&principal);
        Ok(AuthResponse {
            user: principal,
            token,
        })
    }

    async fn verify(&self, token: &str) -> Result<Principal, AuthBackendError> {
        self.simulate_latency().await;
        self.verify_token(token)
            .ok_or(AuthBackendError::InvalidCredentials)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthBackendError> {
        self.simulate_latency().await;

        let principal = {
            let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
            if accounts
                .iter()
                .any(|a| a.principal.email.eq_ignore_ascii_case(&request.email))
            {
                return Err(AuthBackendError::EmailInUse);
            }

            let principal = Principal::new(
                Uuid::new_v4().to_string(),
                request.name.clone(),
                request.email.clone(),
            )
            .role(DEFAULT_ROLE);

            accounts.push(Account {
                principal: principal.clone(),
                password: request.password.clone(),
            });
            principal
        };

        let token = self.issue_token(&principal);
        Ok(AuthResponse {
            user: principal,
            token,
        })
    }
}
