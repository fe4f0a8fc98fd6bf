// Thought-signature cache
//
// Some providers return an opaque signature that lets a follow-up call
// continue a reasoning stream. Signatures are cached per execution id with
// a fixed TTL and evicted lazily: an expired entry dies on read, and every
// write sweeps expired siblings. Nothing in the gateway depends on a hit;
// the cache only improves continuation quality.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Signature TTL. Upstream signatures go stale after roughly an hour.
pub const SIGNATURE_TTL: Duration = Duration::from_secs(3600);

pub struct SignatureCache {
    ttl: Duration,
    inner: Mutex<HashMap<String, (String, Instant)>>,
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::with_ttl(SIGNATURE_TTL)
    }
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the signature for an execution id, evicting it when expired.
    pub fn get(&self, execution_id: &str) -> Option<String> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(execution_id) {
            Some((_, inserted)) if inserted.elapsed() > self.ttl => {
                cache.remove(execution_id);
                None
            }
            Some((signature, _)) => Some(signature.clone()),
            None => None,
        }
    }

    /// Store the signature for an execution id and sweep expired entries.
    pub fn put(&self, execution_id: &str, signature: impl Into<String>) {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(execution_id.to_string(), (signature.into(), Instant::now()));
        let ttl = self.ttl;
        cache.retain(|_, (_, inserted)| inserted.elapsed() <= ttl);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
