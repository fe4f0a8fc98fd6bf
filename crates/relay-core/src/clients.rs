// Cached provider SDK clients
//
// One client per (provider, model, credential-env) triple, constructed on
// first use and reused for the life of the process. The credential is
// resolved from the environment at construction time; a missing variable
// is a *credentials* failure, never a panic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::ProviderFailure;

/// Cache key: two requests with the same key are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub provider: String,
    pub model: String,
    pub credential_env: String,
}

impl ClientKey {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        credential_env: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            credential_env: credential_env.into(),
        }
    }
}

/// Process-lifetime cache of constructed clients.
///
/// Construction happens under the coarse lock, so a concurrent miss on the
/// same key builds exactly once. Entries are never invalidated.
pub struct ClientCache<C> {
    inner: Mutex<HashMap<ClientKey, Arc<C>>>,
}

impl<C> Default for ClientCache<C> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> ClientCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached client for `key`, constructing it on first use.
    ///
    /// `build` receives the credential resolved from the env var named by
    /// `key.credential_env`; if that variable is unset the call fails with
    /// *credentials* and nothing is cached.
    pub fn get_or_create<F>(&self, key: ClientKey, build: F) -> Result<Arc<C>, ProviderFailure>
    where
        F: FnOnce(&str) -> Result<C, ProviderFailure>,
    {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = cache.get(&key) {
            return Ok(Arc::clone(client));
        }

        let credential = std::env::var(&key.credential_env).map_err(|_| {
            ProviderFailure::credentials(format!(
                "environment variable '{}' is not set (required for provider '{}')",
                key.credential_env, key.provider
            ))
        })?;

        let client = Arc::new(build(&credential)?);
        info!(
            provider = %key.provider,
            model = %key.model,
            credential_env = %key.credential_env,
            "created provider client"
        );
        cache.insert(key, Arc::clone(&client));
        Ok(client)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Debug)]
    struct FakeClient {
        key: String,
    }

    #[test]
    fn constructs_once_and_reuses() {
        std::env::set_var("RELAY_TEST_CLIENT_KEY", "secret-1");
        let cache = ClientCache::<FakeClient>::new();
        let key = ClientKey::new("google", "gemini-2.5-pro", "RELAY_TEST_CLIENT_KEY");

        let first = cache
            .get_or_create(key.clone(), |cred| Ok(FakeClient { key: cred.into() }))
            .unwrap();
        assert_eq!(first.key, "secret-1");

        // Second lookup must not re-run the constructor.
        let second = cache
            .get_or_create(key, |_| panic!("constructor ran on a cache hit"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_clients() {
        std::env::set_var("RELAY_TEST_CLIENT_KEY2", "secret-2");
        let cache = ClientCache::<FakeClient>::new();
        for model in ["gemini-2.5-pro", "gemini-2.5-flash"] {
            cache
                .get_or_create(
                    ClientKey::new("google", model, "RELAY_TEST_CLIENT_KEY2"),
                    |cred| Ok(FakeClient { key: cred.into() }),
                )
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_env_var_is_a_credentials_failure() {
        let cache = ClientCache::<FakeClient>::new();
        let err = cache
            .get_or_create(
                ClientKey::new("openai", "gpt-5", "RELAY_TEST_UNSET_VAR"),
                |cred| Ok(FakeClient { key: cred.into() }),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Credentials);
        assert!(err.message.contains("RELAY_TEST_UNSET_VAR"));
        assert_eq!(cache.len(), 0);
    }
}
