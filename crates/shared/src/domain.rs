use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        /// Opaque identifier issued by the hosted data service.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ExerciseId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    /// Wire name used by the data service's role column.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }

    /// Presentation-only label; carries no mutation capability.
    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Student => "Student",
        }
    }
}

/// Role filter applied to the admin user list. `All` disables role filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleFilter {
    All,
    Admin,
    Student,
}

impl RoleFilter {
    pub fn matches(self, role: Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Admin => role == Role::Admin,
            RoleFilter::Student => role == Role::Student,
        }
    }
}

/// The authenticated user context cached by the session provider.
///
/// Read-only to the client core; mutations go through the gateway and the
/// provider's own refresh mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Administrable projection of an identity, one row per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Exercise row as served to the solution viewer. Read-only in this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub id: ExerciseId,
    pub title: String,
    pub solution_code: Option<String>,
    pub solution_published: bool,
}
