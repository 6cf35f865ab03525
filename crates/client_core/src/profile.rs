use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::Identity;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};

use crate::{notice::EphemeralNotice, DataGateway, SessionProvider};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Local, pre-network failures of the profile page's operations. Surfaced
/// synchronously; none of these variants issue a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("display name must not be empty")]
    EmptyName,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("no authenticated identity in session")]
    NotSignedIn,
    #[error("another update for this field is already in flight")]
    Busy,
}

/// Password inputs mirrored from the form. The current password is collected
/// for the form's sake only; the credential update is keyed by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Immutable view of the page handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub identity: Option<Identity>,
    pub full_name: String,
    pub password_form: PasswordForm,
    pub name_saving: bool,
    pub password_saving: bool,
    /// Transient outcome of the last name save, auto-clearing.
    pub name_message: Option<String>,
    /// Transient outcome of the last password change, auto-clearing.
    pub password_message: Option<String>,
    /// Validation channel: persists until the next attempt overwrites it.
    pub password_error: Option<String>,
}

struct FormState {
    full_name: String,
    password: PasswordForm,
    password_error: Option<String>,
}

/// View-model of the profile/account page: display-name editing and password
/// change for the signed-in user. Role display is derived read-only state;
/// no role mutation is exposed here.
pub struct ProfileViewModel {
    session: Arc<dyn SessionProvider>,
    gateway: Arc<dyn DataGateway>,
    form: Mutex<FormState>,
    name_saving: AtomicBool,
    password_saving: AtomicBool,
    name_notice: EphemeralNotice,
    password_notice: EphemeralNotice,
    changes: broadcast::Sender<()>,
}

impl ProfileViewModel {
    pub fn new(session: Arc<dyn SessionProvider>, gateway: Arc<dyn DataGateway>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        Arc::new(Self {
            session,
            gateway,
            form: Mutex::new(FormState {
                full_name: String::new(),
                password: PasswordForm::default(),
                password_error: None,
            }),
            name_saving: AtomicBool::new(false),
            password_saving: AtomicBool::new(false),
            name_notice: EphemeralNotice::new(),
            password_notice: EphemeralNotice::new(),
            changes,
        })
    }

    /// Seeds the name input from the cached identity. No network call: the
    /// profile is already resident in the session cache.
    pub async fn load_initial(&self) {
        if let Some(identity) = self.session.identity() {
            self.form.lock().await.full_name = identity.full_name;
            self.notify();
        }
    }

    pub async fn set_full_name(&self, value: impl Into<String>) {
        self.form.lock().await.full_name = value.into();
        self.notify();
    }

    pub async fn set_password_form(&self, form: PasswordForm) {
        self.form.lock().await.password = form;
        self.notify();
    }

    pub async fn snapshot(&self) -> ProfileSnapshot {
        let form = self.form.lock().await;
        ProfileSnapshot {
            identity: self.session.identity(),
            full_name: form.full_name.clone(),
            password_form: form.password.clone(),
            name_saving: self.name_saving.load(Ordering::SeqCst),
            password_saving: self.password_saving.load(Ordering::SeqCst),
            name_message: self.name_notice.current(),
            password_message: self.password_notice.current(),
            password_error: form.password_error.clone(),
        }
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    pub fn name_messages(&self) -> watch::Receiver<Option<String>> {
        self.name_notice.subscribe()
    }

    pub fn password_messages(&self) -> watch::Receiver<Option<String>> {
        self.password_notice.subscribe()
    }

    /// Persists the trimmed name input for the signed-in identity. The local
    /// input is rewritten only once the server accepts the update.
    pub async fn save_display_name(&self) -> Result<(), ProfileError> {
        let trimmed = {
            let form = self.form.lock().await;
            form.full_name.trim().to_string()
        };
        if trimmed.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let identity = self.session.identity().ok_or(ProfileError::NotSignedIn)?;
        if self
            .name_saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ProfileError::Busy);
        }
        self.notify();

        let result = self.gateway.update_profile_name(&identity.id, &trimmed).await;
        self.name_saving.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                self.form.lock().await.full_name = trimmed;
                info!(user_id = %identity.id, "profile: display name updated");
                self.name_notice.set("Name updated.");
            }
            Err(err) => {
                warn!(user_id = %identity.id, "profile: display name update failed: {err}");
                self.name_notice
                    .set(format!("Could not save name: {}", err.message));
            }
        }
        self.notify();
        Ok(())
    }

    /// Validates locally, then updates the signed-in identity's credential.
    /// On success the three password fields are cleared; on a gateway failure
    /// they are kept so the user can retry without retyping.
    pub async fn change_password(&self) -> Result<(), ProfileError> {
        let password = {
            let form = self.form.lock().await;
            form.password.clone()
        };
        if let Err(err) = validate_password(&password.new_password, &password.confirm_password) {
            self.form.lock().await.password_error = Some(err.to_string());
            self.notify();
            return Err(err);
        }
        if self.session.identity().is_none() {
            return Err(ProfileError::NotSignedIn);
        }
        if self
            .password_saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ProfileError::Busy);
        }
        {
            self.form.lock().await.password_error = None;
        }
        self.password_notice.clear();
        self.notify();

        let result = self.gateway.update_password(&password.new_password).await;
        self.password_saving.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                self.form.lock().await.password = PasswordForm::default();
                info!("profile: password updated");
                self.password_notice.set("Password updated.");
            }
            Err(err) => {
                warn!("profile: password update failed: {err}");
                self.form.lock().await.password_error = Some(format!("✗ {}", err.message));
            }
        }
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        let _ = self.changes.send(());
    }
}

/// Short-circuits on the first violated rule: length before equality.
fn validate_password(new_password: &str, confirm_password: &str) -> Result<(), ProfileError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ProfileError::PasswordTooShort);
    }
    if new_password != confirm_password {
        return Err(ProfileError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
