//! Client-side core of the classroom platform's user-facing pages.
//!
//! Each page owns a view-model that mirrors a slice of the hosted data
//! service, issues mutations through the [`DataGateway`] seam, and reconciles
//! its local state only after the server acknowledges. Rendering, routing,
//! and the embedded editor live outside this crate and consume snapshots plus
//! change events.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use shared::{
    domain::{ExerciseId, ExerciseRecord, Identity, Role, UserId, UserRecord},
    error::GatewayError,
};

pub mod admin_users;
pub mod notice;
pub mod profile;
pub mod rest;
pub mod solution;
#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use admin_users::{ActionOutcome, AdminUsersViewModel};
pub use notice::EphemeralNotice;
pub use profile::{ProfileError, ProfileViewModel};
pub use rest::{GatewayConfig, RestGateway};
pub use solution::{SolutionPage, SolutionViewModel};

/// Typed seam over the hosted data/auth service.
///
/// Reads are plain selects against named collections; mutations return only
/// an acknowledgement, and callers patch their local mirror on success. The
/// service owns all authorization, uniqueness, and cascade rules.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Full user collection, newest account first (server-side ordering).
    async fn list_profiles(&self) -> Result<Vec<UserRecord>, GatewayError>;

    async fn update_profile_name(
        &self,
        user_id: &UserId,
        full_name: &str,
    ) -> Result<(), GatewayError>;

    async fn update_profile_role(&self, user_id: &UserId, role: Role)
        -> Result<(), GatewayError>;

    /// Updates the signed-in identity's own credential.
    async fn update_password(&self, new_password: &str) -> Result<(), GatewayError>;

    /// Privileged account deletion. Under normal client credentials the
    /// service refuses this; callers must treat the refusal as an expected
    /// outcome, not an anomaly.
    async fn delete_identity(&self, user_id: &UserId) -> Result<(), GatewayError>;

    /// Zero-or-one exercise lookup.
    async fn fetch_exercise(
        &self,
        exercise_id: &ExerciseId,
    ) -> Result<Option<ExerciseRecord>, GatewayError>;

    /// Existence probe for a submission by (exercise, student). Only an id
    /// column is fetched; existence is "the result is non-empty".
    async fn has_submission(
        &self,
        exercise_id: &ExerciseId,
        student_id: &UserId,
    ) -> Result<bool, GatewayError>;
}

/// Fallback gateway for contexts assembled without a service connection.
pub struct MissingDataGateway;

fn gateway_unavailable() -> GatewayError {
    GatewayError::internal("data gateway unavailable")
}

#[async_trait]
impl DataGateway for MissingDataGateway {
    async fn list_profiles(&self) -> Result<Vec<UserRecord>, GatewayError> {
        Err(gateway_unavailable())
    }

    async fn update_profile_name(
        &self,
        _user_id: &UserId,
        _full_name: &str,
    ) -> Result<(), GatewayError> {
        Err(gateway_unavailable())
    }

    async fn update_profile_role(
        &self,
        _user_id: &UserId,
        _role: Role,
    ) -> Result<(), GatewayError> {
        Err(gateway_unavailable())
    }

    async fn update_password(&self, _new_password: &str) -> Result<(), GatewayError> {
        Err(gateway_unavailable())
    }

    async fn delete_identity(&self, _user_id: &UserId) -> Result<(), GatewayError> {
        Err(gateway_unavailable())
    }

    async fn fetch_exercise(
        &self,
        _exercise_id: &ExerciseId,
    ) -> Result<Option<ExerciseRecord>, GatewayError> {
        Err(gateway_unavailable())
    }

    async fn has_submission(
        &self,
        _exercise_id: &ExerciseId,
        _student_id: &UserId,
    ) -> Result<bool, GatewayError> {
        Err(gateway_unavailable())
    }
}

/// Supplies the current authenticated identity and its cached profile fields.
/// Read-only from this crate's perspective; the provider refreshes itself.
pub trait SessionProvider: Send + Sync {
    fn identity(&self) -> Option<Identity>;
}

/// In-memory session cache, replaced wholesale by the owning auth layer.
pub struct CachedSession {
    identity: RwLock<Option<Identity>>,
}

impl CachedSession {
    pub fn new(identity: Option<Identity>) -> Arc<Self> {
        Arc::new(Self {
            identity: RwLock::new(identity),
        })
    }

    pub fn signed_in(identity: Identity) -> Arc<Self> {
        Self::new(Some(identity))
    }

    pub fn replace(&self, identity: Option<Identity>) {
        if let Ok(mut guard) = self.identity.write() {
            *guard = identity;
        }
    }
}

impl SessionProvider for CachedSession {
    fn identity(&self) -> Option<Identity> {
        self.identity.read().ok().and_then(|guard| guard.clone())
    }
}

/// Yes/no gate consulted before any role change or deletion. The core
/// proceeds only on an affirmative answer; how the question is posed (dialog,
/// terminal prompt) is the caller's business.
#[async_trait]
pub trait ConfirmationHook: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Fallback hook: with nobody to ask, destructive actions never proceed.
pub struct DenyAllConfirmations;

#[async_trait]
impl ConfirmationHook for DenyAllConfirmations {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
