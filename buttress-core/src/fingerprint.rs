//! Deterministic cache keys.

use crate::request::ServiceRequest;
use sha2::{Digest, Sha256};

/// Cache key derived from a request's identity-relevant fields.
///
/// Identical `{service, method, path, query, body}` tuples always produce
/// the same fingerprint; query pairs are sorted before hashing so parameter
/// order does not matter. Keys carry a readable `service:` prefix so all of
/// a service's entries can be purged together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a request.
    pub fn of(request: &ServiceRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.service.as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.method.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.path.as_bytes());
        hasher.update([0x1f]);

        let mut query: Vec<&(String, String)> = request.query.iter().collect();
        query.sort();
        for (key, value) in query {
            hasher.update(key.as_bytes());
            hasher.update([0x1e]);
            hasher.update(value.as_bytes());
            hasher.update([0x1f]);
        }

        if let Some(body) = &request.body {
            hasher.update(body);
        }

        Fingerprint(format!(
            "{}:{}",
            request.service,
            hex::encode(hasher.finalize())
        ))
    }

    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The service prefix of the key.
    pub(crate) fn service(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
