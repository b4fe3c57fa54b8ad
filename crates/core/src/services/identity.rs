//! Identity capability.
//!
//! The identity provider owns credentials and the current session identity.
//! Application profiles live in the document store and are keyed by the
//! identity's `uid`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use socialsync_common::{AppError, AppResult, AuthErrorKind, IdGenerator};
use socialsync_db::Subscription;

use super::lock;

/// Provider ID recorded for email/password accounts.
pub const PASSWORD_PROVIDER: &str = "password";

/// Provider ID recorded for popup sign-ins.
pub const POPUP_PROVIDER: &str = "popup";

/// Shortest password the provider accepts.
const MIN_PASSWORD_LENGTH: usize = 6;

/// A signed-in identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    /// How this identity signed in.
    pub provider_id: String,
}

/// Display fields attached to a new account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityProfile {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Listener for identity changes; `None` means signed out.
pub type IdentityListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Identity operations consumed by the client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in through the provider's federated popup.
    async fn sign_in_with_popup(&self) -> AppResult<Identity>;

    /// Sign in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Identity>;

    /// Create an email/password account and sign it in.
    async fn register(
        &self,
        email: &str,
        password: &str,
        profile: IdentityProfile,
    ) -> AppResult<Identity>;

    /// End the current session.
    async fn sign_out(&self) -> AppResult<()>;

    /// The identity currently signed in.
    fn current(&self) -> Option<Identity>;

    /// Observe identity changes.
    ///
    /// The listener is called with the current identity right away and again
    /// after every sign-in and sign-out.
    fn on_identity_change(&self, listener: IdentityListener) -> Subscription;
}

/// Shared identity provider handle.
pub type IdentityService = Arc<dyn IdentityProvider>;

struct Account {
    identity: Identity,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    /// Accounts keyed by lowercased email.
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    /// What the next popup sign-in resolves to; `None` means the user closes it.
    popup: Option<Identity>,
    listeners: HashMap<u64, IdentityListener>,
    next_listener_id: u64,
}

/// In-process identity provider.
///
/// Passwords are stored as argon2 hashes. Popup sign-ins resolve to
/// whatever identity was configured with [`set_popup_identity`].
///
/// [`set_popup_identity`]: MemoryIdentityProvider::set_popup_identity
#[derive(Clone, Default)]
pub struct MemoryIdentityProvider {
    inner: Arc<Mutex<Inner>>,
    id_gen: IdGenerator,
}

impl MemoryIdentityProvider {
    /// Create a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what the next popup sign-in returns.
    pub fn set_popup_identity(&self, identity: Option<Identity>) {
        lock(&self.inner).popup = identity;
    }

    /// A popup identity with fresh `uid`.
    #[must_use]
    pub fn popup_identity(&self, display_name: &str, email: &str) -> Identity {
        Identity {
            uid: self.id_gen.generate_uid(),
            display_name: Some(display_name.to_string()),
            email: Some(email.to_string()),
            photo_url: None,
            provider_id: POPUP_PROVIDER.to_string(),
        }
    }

    fn switch_to(&self, identity: Option<Identity>) {
        let listeners: Vec<IdentityListener> = {
            let mut inner = lock(&self.inner);
            inner.current.clone_from(&identity);
            inner.listeners.values().cloned().collect()
        };
        match &identity {
            Some(id) => tracing::info!(uid = %id.uid, provider = %id.provider_id, "Signed in"),
            None => tracing::info!("Signed out"),
        }
        for listener in listeners {
            listener(identity.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_popup(&self) -> AppResult<Identity> {
        let identity = lock(&self.inner)
            .popup
            .clone()
            .ok_or(AppError::Auth(AuthErrorKind::PopupCancelled))?;
        self.switch_to(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Identity> {
        let (identity, password_hash) = {
            let inner = lock(&self.inner);
            let account = inner
                .accounts
                .get(&email.to_lowercase())
                .ok_or(AppError::Auth(AuthErrorKind::InvalidCredentials))?;
            (account.identity.clone(), account.password_hash.clone())
        };

        if !verify_password(password, &password_hash)? {
            return Err(AuthErrorKind::InvalidCredentials.into());
        }

        self.switch_to(Some(identity.clone()));
        Ok(identity)
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        profile: IdentityProfile,
    ) -> AppResult<Identity> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthErrorKind::WeakPassword.into());
        }

        let key = email.to_lowercase();
        if lock(&self.inner).accounts.contains_key(&key) {
            return Err(AuthErrorKind::EmailAlreadyInUse.into());
        }

        let password_hash = hash_password(password)?;
        let identity = Identity {
            uid: self.id_gen.generate_uid(),
            display_name: profile.display_name,
            email: Some(email.to_string()),
            photo_url: profile.photo_url,
            provider_id: PASSWORD_PROVIDER.to_string(),
        };

        {
            let mut inner = lock(&self.inner);
            // Re-check: hashing ran without the lock held.
            if inner.accounts.contains_key(&key) {
                return Err(AuthErrorKind::EmailAlreadyInUse.into());
            }
            inner.accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password_hash,
                },
            );
        }

        self.switch_to(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> AppResult<()> {
        self.switch_to(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        lock(&self.inner).current.clone()
    }

    fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(id, listener.clone());
            (id, inner.current.clone())
        };

        listener(current);

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Subscription::new("identity", move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).listeners.remove(&id);
            }
        })
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
