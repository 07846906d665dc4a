//! Domain ownership verification.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Proves that whoever registers a domain controls it.
#[allow(async_fn_in_trait)]
pub trait DomainOwnershipVerifier: Send + Sync + 'static {
    /// True if `domain` currently serves `expected_token`.
    fn verify(&self, domain: &str, expected_token: &str) -> impl Future<Output = bool> + Send;
}

/// Fetches the site root and compares a response header with the token.
#[derive(Debug, Clone)]
pub struct HeaderOwnershipVerifier {
    client: reqwest::Client,
    header: String,
    scheme: &'static str,
}

impl HeaderOwnershipVerifier {
    /// Create a verifier from registry settings.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.verification_timeout_secs))
            .build()
            .map_err(|e| RegistryError::Verifier(e.to_string()))?;
        Ok(Self {
            client,
            header: config.verification_header.clone(),
            scheme: "https",
        })
    }

    /// Use plain HTTP. For local development only.
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.scheme = "http";
        self
    }

    fn url(&self, domain: &str) -> String {
        format!("{}://{domain}/", self.scheme)
    }
}

impl DomainOwnershipVerifier for HeaderOwnershipVerifier {
    async fn verify(&self, domain: &str, expected_token: &str) -> bool {
        let url = self.url(domain);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(domain, error = %e, "ownership fetch failed");
                return false;
            }
        };

        let matches = response
            .headers()
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == expected_token);
        debug!(domain, status = %response.status(), matches, "ownership header checked");
        matches
    }
}

/// Verifier backed by tokens provisioned out of band.
#[derive(Debug, Default)]
pub struct StaticOwnershipVerifier {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticOwnershipVerifier {
    /// Create an empty verifier. Every check fails until a token is allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` for `domain`.
    pub fn allow(&self, domain: impl Into<String>, token: impl Into<String>) {
        self.tokens.write().insert(domain.into(), token.into());
    }
}

impl DomainOwnershipVerifier for StaticOwnershipVerifier {
    async fn verify(&self, domain: &str, expected_token: &str) -> bool {
        self.tokens
            .read()
            .get(domain)
            .is_some_and(|token| token == expected_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verifier_matches_token() {
        let verifier = StaticOwnershipVerifier::new();
        verifier.allow("example.com", "tok-123");

        assert!(verifier.verify("example.com", "tok-123").await);
        assert!(!verifier.verify("example.com", "tok-999").await);
        assert!(!verifier.verify("other.com", "tok-123").await);
    }

    #[test]
    fn header_verifier_urls() {
        let verifier = HeaderOwnershipVerifier::new(&RegistryConfig::default()).unwrap();
        assert_eq!(verifier.url("example.com"), "https://example.com/");
        assert_eq!(verifier.insecure().url("localhost:8080"), "http://localhost:8080/");
    }

    #[tokio::test]
    async fn unreachable_domain_fails_verification() {
        let config = RegistryConfig {
            verification_timeout_secs: 1,
            ..RegistryConfig::default()
        };
        let verifier = HeaderOwnershipVerifier::new(&config).unwrap().insecure();
        // Port 9 on loopback is discard; nothing answers HTTP there.
        assert!(!verifier.verify("127.0.0.1:9", "token").await);
    }
}
