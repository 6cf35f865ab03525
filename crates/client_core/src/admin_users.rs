use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::{Role, RoleFilter, UserId, UserRecord};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};

use crate::{notice::EphemeralNotice, ConfirmationHook, DataGateway};

/// Shown when the service refuses an account deletion, which is the expected
/// outcome under normal client credentials.
pub const ACCOUNT_DELETE_GUIDANCE: &str =
    "Deleting accounts requires service-level credentials. Use the hosted console's \
     authentication panel instead.";

/// Result of a confirmed, gateway-backed admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Server acknowledged; the local mirror has been patched.
    Applied,
    /// The operator declined the confirmation prompt.
    Declined,
    /// The same action is already in flight.
    Busy,
    /// The gateway refused; local state is unchanged and a notice explains why.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCounts {
    pub total: usize,
    pub admins: usize,
    pub students: usize,
}

#[derive(Debug, Clone)]
pub struct AdminUsersSnapshot {
    /// Mirror of the server's collection, newest account first.
    pub users: Vec<UserRecord>,
    pub loading: bool,
    pub filter: RoleFilter,
    pub search: String,
    pub action_message: Option<String>,
}

struct AdminUsersState {
    users: Vec<UserRecord>,
    loading: bool,
    filter: RoleFilter,
    search: String,
}

/// View-model of the admin user-management page. Owns a wholesale-refreshed
/// mirror of the user collection; mutations are confirmed through the hook,
/// applied on the server, and only then patched into the mirror.
pub struct AdminUsersViewModel {
    gateway: Arc<dyn DataGateway>,
    confirm: Arc<dyn ConfirmationHook>,
    state: Mutex<AdminUsersState>,
    role_change_inflight: AtomicBool,
    removal_inflight: AtomicBool,
    notice: EphemeralNotice,
    changes: broadcast::Sender<()>,
}

impl AdminUsersViewModel {
    pub fn new(gateway: Arc<dyn DataGateway>, confirm: Arc<dyn ConfirmationHook>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        Arc::new(Self {
            gateway,
            confirm,
            state: Mutex::new(AdminUsersState {
                users: Vec::new(),
                loading: true,
                filter: RoleFilter::All,
                search: String::new(),
            }),
            role_change_inflight: AtomicBool::new(false),
            removal_inflight: AtomicBool::new(false),
            notice: EphemeralNotice::new(),
            changes,
        })
    }

    /// Replaces the mirrored collection wholesale; no incremental load. On a
    /// gateway failure the mirror is left untouched and an error notice is
    /// posted. Either way the page stops loading.
    pub async fn refresh(&self) {
        match self.gateway.list_profiles().await {
            Ok(users) => {
                info!(count = users.len(), "admin: user list refreshed");
                let mut state = self.state.lock().await;
                state.users = users;
                state.loading = false;
            }
            Err(err) => {
                warn!("admin: user list refresh failed: {err}");
                self.state.lock().await.loading = false;
                self.notice
                    .set(format!("Could not load users: {}", err.message));
            }
        }
        self.notify();
    }

    pub async fn set_filter(&self, filter: RoleFilter) {
        self.state.lock().await.filter = filter;
        self.notify();
    }

    pub async fn set_search(&self, search: impl Into<String>) {
        self.state.lock().await.search = search.into();
        self.notify();
    }

    /// Derived view under the active filter and search term. Pure over the
    /// snapshot; recomputed on demand, never cached.
    pub async fn visible_users(&self) -> Vec<UserRecord> {
        let state = self.state.lock().await;
        filter_users(&state.users, state.filter, &state.search)
    }

    /// Header-card tallies over the unfiltered mirror.
    pub async fn role_counts(&self) -> RoleCounts {
        let state = self.state.lock().await;
        let admins = state
            .users
            .iter()
            .filter(|user| user.role == Role::Admin)
            .count();
        RoleCounts {
            total: state.users.len(),
            admins,
            students: state.users.len() - admins,
        }
    }

    pub async fn snapshot(&self) -> AdminUsersSnapshot {
        let state = self.state.lock().await;
        AdminUsersSnapshot {
            users: state.users.clone(),
            loading: state.loading,
            filter: state.filter,
            search: state.search.clone(),
            action_message: self.notice.current(),
        }
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    pub fn action_messages(&self) -> watch::Receiver<Option<String>> {
        self.notice.subscribe()
    }

    /// Promote/demote, unified. Requires confirmation; on server ack the one
    /// matching record is patched in place rather than refetched. The mirror
    /// is never patched speculatively.
    pub async fn set_role(&self, user_id: &UserId, new_role: Role) -> ActionOutcome {
        let prompt = format!("Change this user's role to \"{}\"?", new_role.as_str());
        if !self.confirm.confirm(&prompt).await {
            info!(user_id = %user_id, "admin: role change declined at confirmation");
            return ActionOutcome::Declined;
        }
        if self
            .role_change_inflight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ActionOutcome::Busy;
        }

        let result = self.gateway.update_profile_role(user_id, new_role).await;
        self.role_change_inflight.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock().await;
                    if let Some(user) = state.users.iter_mut().find(|user| &user.id == user_id) {
                        user.role = new_role;
                    }
                }
                info!(user_id = %user_id, role = new_role.as_str(), "admin: role updated");
                self.notice.set("Role updated.");
                self.notify();
                ActionOutcome::Applied
            }
            Err(err) => {
                warn!(user_id = %user_id, "admin: role update failed: {err}");
                self.notice
                    .set(format!("Role update failed: {}", err.message));
                self.notify();
                ActionOutcome::Failed
            }
        }
    }

    /// Account deletion through the privileged auth sub-API. The confirmation
    /// warns about irreversibility and the cascade over the user's
    /// submissions. Refusal by the service is the expected path from this
    /// surface; no fallback mutation is attempted.
    pub async fn remove_user(&self, user_id: &UserId, display_name: &str) -> ActionOutcome {
        let prompt = format!(
            "Delete the account of \"{display_name}\"? This cannot be undone and also \
             removes all of their submissions."
        );
        if !self.confirm.confirm(&prompt).await {
            info!(user_id = %user_id, "admin: account deletion declined at confirmation");
            return ActionOutcome::Declined;
        }
        if self
            .removal_inflight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ActionOutcome::Busy;
        }

        let result = self.gateway.delete_identity(user_id).await;
        self.removal_inflight.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock().await;
                    state.users.retain(|user| &user.id != user_id);
                }
                info!(user_id = %user_id, "admin: account deleted");
                self.notice.set("User deleted.");
                self.notify();
                ActionOutcome::Applied
            }
            Err(err) => {
                info!(
                    user_id = %user_id,
                    code = ?err.code,
                    "admin: account deletion refused by service"
                );
                self.notice.set(ACCOUNT_DELETE_GUIDANCE);
                self.notify();
                ActionOutcome::Failed
            }
        }
    }

    fn notify(&self) {
        let _ = self.changes.send(());
    }
}

/// Pure view over a mirrored user list: exact role filter first, then a
/// case-insensitive substring match against the full name. The input order
/// (newest first) is preserved.
pub fn filter_users(users: &[UserRecord], filter: RoleFilter, search: &str) -> Vec<UserRecord> {
    let needle = search.to_lowercase();
    users
        .iter()
        .filter(|user| filter.matches(user.role))
        .filter(|user| needle.is_empty() || user.full_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/admin_users_tests.rs"]
mod tests;
