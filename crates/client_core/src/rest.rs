use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shared::{
    domain::{ExerciseId, ExerciseRecord, Role, UserId, UserRecord},
    error::{ErrorCode, GatewayError},
};

use async_trait::async_trait;

use crate::DataGateway;

/// Connection settings for the hosted data/auth service.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// Bearer token of the signed-in identity; the api key is used when the
    /// session is anonymous.
    pub access_token: Option<String>,
}

/// [`DataGateway`] over the hosted service's REST surface: row collections at
/// `rest/v1/{collection}` with `column=eq.value` filters, the credential
/// update at `auth/v1/user`, and the privileged account deletion at
/// `auth/v1/admin/users/{id}`. No retries; timeouts are whatever the
/// transport defaults provide.
pub struct RestGateway {
    http: Client,
    config: GatewayConfig,
}

impl RestGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        self.http
            .request(
                method,
                format!("{}/{path}", self.config.base_url.trim_end_matches('/')),
            )
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    fn collection(name: &str) -> String {
        format!("rest/v1/{name}")
    }
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(alias = "msg", alias = "error_description")]
    message: Option<String>,
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        _ => ErrorCode::Internal,
    }
}

/// Maps a non-2xx response to a [`GatewayError`], preferring the service's
/// own error message when the body carries one.
async fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = code_for_status(status);
    let message = match response.json::<ServiceErrorBody>().await {
        Ok(ServiceErrorBody {
            message: Some(message),
        }) => message,
        _ => format!("service responded with status {status}"),
    };
    Err(GatewayError::new(code, message))
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::internal(format!("request failed: {err}"))
}

fn decode(err: reqwest::Error) -> GatewayError {
    GatewayError::internal(format!("invalid response payload: {err}"))
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn list_profiles(&self) -> Result<Vec<UserRecord>, GatewayError> {
        let response = self
            .request(Method::GET, &Self::collection("profiles"))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(decode)
    }

    async fn update_profile_name(
        &self,
        user_id: &UserId,
        full_name: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .request(Method::PATCH, &Self::collection("profiles"))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "full_name": full_name }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn update_profile_role(
        &self,
        user_id: &UserId,
        role: Role,
    ) -> Result<(), GatewayError> {
        let response = self
            .request(Method::PATCH, &Self::collection("profiles"))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "role": role }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), GatewayError> {
        let response = self
            .request(Method::PUT, "auth/v1/user")
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn delete_identity(&self, user_id: &UserId) -> Result<(), GatewayError> {
        let response = self
            .request(Method::DELETE, &format!("auth/v1/admin/users/{user_id}"))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn fetch_exercise(
        &self,
        exercise_id: &ExerciseId,
    ) -> Result<Option<ExerciseRecord>, GatewayError> {
        let response = self
            .request(Method::GET, &Self::collection("exercises"))
            .query(&[
                ("select", "id,title,solution_code,solution_published".to_string()),
                ("id", format!("eq.{exercise_id}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let mut rows: Vec<ExerciseRecord> = check(response).await?.json().await.map_err(decode)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    async fn has_submission(
        &self,
        exercise_id: &ExerciseId,
        student_id: &UserId,
    ) -> Result<bool, GatewayError> {
        let response = self
            .request(Method::GET, &Self::collection("submissions"))
            .query(&[
                ("select", "id".to_string()),
                ("exercise_id", format!("eq.{exercise_id}")),
                ("student_id", format!("eq.{student_id}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<serde_json::Value> = check(response).await?.json().await.map_err(decode)?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
