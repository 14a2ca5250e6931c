// Current-user cache shared by every request, keyed by access token

use cached::{Cached, TimedCache};
use tokio::sync::Mutex;

use crate::backend::{Backend, BackendError};
use crate::models::CurrentUser;

pub struct SessionCache {
    users: Mutex<TimedCache<String, CurrentUser>>,
}

impl SessionCache {
    pub fn new(ttl_secs: u64) -> Self {
        SessionCache {
            users: Mutex::new(TimedCache::with_lifespan(ttl_secs)),
        }
    }

    /// Cached user for the token, looked up on a miss or after expiry.
    pub async fn current_user(
        &self,
        access_token: &str,
        backend: &dyn Backend,
    ) -> Result<Option<CurrentUser>, BackendError> {
        let key = access_token.to_string();
        if let Some(user) = self.users.lock().await.cache_get(&key).cloned() {
            tracing::debug!("Using cached session for user {}", user.id);
            return Ok(Some(user));
        }
        self.refresh(access_token, backend).await
    }

    /// Re-fetches the identity and profile, replacing any cached entry.
    pub async fn refresh(
        &self,
        access_token: &str,
        backend: &dyn Backend,
    ) -> Result<Option<CurrentUser>, BackendError> {
        let key = access_token.to_string();
        let Some(auth_user) = backend.get_user(access_token).await? else {
            tracing::info!("Access token rejected by identity service");
            self.users.lock().await.cache_remove(&key);
            return Ok(None);
        };

        // A missing or unreadable profile still leaves the user signed in
        let profile = match backend.get_profile(&auth_user.id, access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Failed to load profile for user {}: {}", auth_user.id, e);
                None
            }
        };

        let user = CurrentUser {
            id: auth_user.id,
            email: auth_user.email,
            profile,
        };
        tracing::info!("Session refreshed for user {}", user.id);
        let mut users = self.users.lock().await;
        // Tokens that are never presented again would otherwise stay forever
        users.flush();
        users.cache_set(key, user.clone());
        Ok(Some(user))
    }

    pub async fn invalidate(&self, access_token: &str) {
        self.users.lock().await.cache_remove(&access_token.to_string());
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.users.lock().await.cache_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::models::{Profile, UserType};

    #[tokio::test]
    async fn caches_until_refreshed() {
        let backend = MemoryBackend::new();
        let token = backend.add_account("u1", "niamh@example.ie", "pw");
        backend
            .profiles
            .lock()
            .unwrap()
            .insert("u1".into(), Profile::basic("u1", UserType::Private, "Niamh"));
        let cache = SessionCache::new(60);

        let first = cache.current_user(&token, &backend).await.unwrap().unwrap();
        assert_eq!(first.display_name(), "Niamh");
        let _ = cache.current_user(&token, &backend).await.unwrap();
        assert_eq!(backend.user_lookups(), 1);

        backend
            .update_profile_name("u1", "Niamh Walsh", &token)
            .await
            .unwrap();
        let stale = cache.current_user(&token, &backend).await.unwrap().unwrap();
        assert_eq!(stale.display_name(), "Niamh");

        let fresh = cache.refresh(&token, &backend).await.unwrap().unwrap();
        assert_eq!(fresh.display_name(), "Niamh Walsh");
        assert_eq!(backend.user_lookups(), 2);
    }

    #[tokio::test]
    async fn unknown_token_is_signed_out() {
        let backend = MemoryBackend::new();
        let cache = SessionCache::new(60);
        assert!(cache.current_user("nope", &backend).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_lookup() {
        let backend = MemoryBackend::new();
        let token = backend.add_account("u2", "eoin@example.ie", "pw");
        let cache = SessionCache::new(60);

        assert!(cache.current_user(&token, &backend).await.unwrap().is_some());
        backend.sign_out(&token).await.unwrap();
        cache.invalidate(&token).await;
        assert!(cache.current_user(&token, &backend).await.unwrap().is_none());
        assert_eq!(backend.user_lookups(), 2);
    }

    #[tokio::test]
    async fn expired_users_are_dropped_on_next_sign_in() {
        let backend = MemoryBackend::new();
        let cache = SessionCache::new(1);
        for n in 0..5 {
            let token = backend.add_account(&format!("u{}", n), &format!("user{}@example.ie", n), "pw");
            cache.current_user(&token, &backend).await.unwrap();
        }
        assert_eq!(cache.len().await, 5);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let token = backend.add_account("late", "late@example.ie", "pw");
        cache.refresh(&token, &backend).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }
}
