use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::{
    domain::{ExerciseId, ExerciseRecord, Role, UserId, UserRecord},
    error::{ErrorCode, GatewayError},
};
use tokio::sync::{watch, Mutex};

use crate::{ConfirmationHook, DataGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListProfiles,
    UpdateProfileName {
        user_id: UserId,
        full_name: String,
    },
    UpdateProfileRole {
        user_id: UserId,
        role: Role,
    },
    UpdatePassword {
        new_password: String,
    },
    DeleteIdentity {
        user_id: UserId,
    },
    FetchExercise {
        exercise_id: ExerciseId,
    },
    HasSubmission {
        exercise_id: ExerciseId,
        student_id: UserId,
    },
}

/// Configurable fake gateway: serves canned rows, records every call, and can
/// be switched into a failing mode mid-test.
pub struct RecordingGateway {
    profiles: Vec<UserRecord>,
    exercise: Option<ExerciseRecord>,
    submission_exists: bool,
    fail_with: Mutex<Option<GatewayError>>,
    stalled: Mutex<Option<watch::Receiver<bool>>>,
    recorded: Mutex<Vec<GatewayCall>>,
}

/// Unparks calls held by [`RecordingGateway::stall`]. Dropping the handle
/// releases them too.
pub struct GatewayRelease {
    tx: watch::Sender<bool>,
}

impl GatewayRelease {
    pub fn release(&self) {
        let _ = self.tx.send(true);
    }
}

impl RecordingGateway {
    pub fn ok() -> Self {
        Self {
            profiles: Vec::new(),
            exercise: None,
            submission_exists: false,
            fail_with: Mutex::new(None),
            stalled: Mutex::new(None),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profiles(profiles: Vec<UserRecord>) -> Self {
        Self {
            profiles,
            ..Self::ok()
        }
    }

    pub fn with_exercise(exercise: Option<ExerciseRecord>, submission_exists: bool) -> Self {
        Self {
            exercise,
            submission_exists,
            ..Self::ok()
        }
    }

    pub fn failing(code: ErrorCode, message: &str) -> Self {
        Self {
            fail_with: Mutex::new(Some(GatewayError::new(code, message))),
            ..Self::ok()
        }
    }

    pub async fn set_failure(&self, error: Option<GatewayError>) {
        *self.fail_with.lock().await = error;
    }

    /// Parks every call made after this point until the handle is released,
    /// keeping the caller's in-flight window open for the test to probe.
    pub async fn stall(&self) -> GatewayRelease {
        let (tx, rx) = watch::channel(false);
        *self.stalled.lock().await = Some(rx);
        GatewayRelease { tx }
    }

    pub async fn recorded(&self) -> Vec<GatewayCall> {
        self.recorded.lock().await.clone()
    }

    async fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        self.recorded.lock().await.push(call);
        let held = self.stalled.lock().await.clone();
        if let Some(mut gate) = held {
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
        }
        match self.fail_with.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataGateway for RecordingGateway {
    async fn list_profiles(&self) -> Result<Vec<UserRecord>, GatewayError> {
        self.record(GatewayCall::ListProfiles).await?;
        Ok(self.profiles.clone())
    }

    async fn update_profile_name(
        &self,
        user_id: &UserId,
        full_name: &str,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::UpdateProfileName {
            user_id: user_id.clone(),
            full_name: full_name.to_string(),
        })
        .await
    }

    async fn update_profile_role(
        &self,
        user_id: &UserId,
        role: Role,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::UpdateProfileRole {
            user_id: user_id.clone(),
            role,
        })
        .await
    }

    async fn update_password(&self, new_password: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::UpdatePassword {
            new_password: new_password.to_string(),
        })
        .await
    }

    async fn delete_identity(&self, user_id: &UserId) -> Result<(), GatewayError> {
        self.record(GatewayCall::DeleteIdentity {
            user_id: user_id.clone(),
        })
        .await
    }

    async fn fetch_exercise(
        &self,
        exercise_id: &ExerciseId,
    ) -> Result<Option<ExerciseRecord>, GatewayError> {
        self.record(GatewayCall::FetchExercise {
            exercise_id: exercise_id.clone(),
        })
        .await?;
        Ok(self.exercise.clone())
    }

    async fn has_submission(
        &self,
        exercise_id: &ExerciseId,
        student_id: &UserId,
    ) -> Result<bool, GatewayError> {
        self.record(GatewayCall::HasSubmission {
            exercise_id: exercise_id.clone(),
            student_id: student_id.clone(),
        })
        .await?;
        Ok(self.submission_exists)
    }
}

/// Confirmation hook that records every prompt and answers with a script.
pub struct ScriptedConfirmation {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self {
            answer: true,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self {
            answer: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl ConfirmationHook for ScriptedConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().await.push(prompt.to_string());
        self.answer
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

pub fn user(id: &str, full_name: &str, role: Role, days_ago: i64) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: None,
        full_name: full_name.to_string(),
        role,
        created_at: base_time() - Duration::days(days_ago),
    }
}

pub fn exercise(id: &str, title: &str, code: Option<&str>, published: bool) -> ExerciseRecord {
    ExerciseRecord {
        id: ExerciseId::new(id),
        title: title.to_string(),
        solution_code: code.map(str::to_string),
        solution_published: published,
    }
}
