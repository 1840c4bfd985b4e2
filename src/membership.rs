//! Client for the OSF membership database
//!
//! The API answers `GET /api/v1/bot/validate` with `{"result": bool}` for a
//! JSON body `{"id": <discord user id>}`. Anything other than a 200 is turned
//! into an error payload of the form `"{status}: {body}"`.

use async_trait::async_trait;
use derive_more::Display;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BotResult;

pub const VALIDATE_PATH: &str = "/api/v1/bot/validate";

/// Outcome of a membership lookup
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ValidationStatus {
    #[display("member")]
    Member,
    #[display("not a member")]
    NotMember,
    #[display("error: {_0}")]
    Error(String),
}

#[derive(Debug, Serialize)]
struct ValidateRequest {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    result: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipApi: Send + Sync {
    /// Look up whether the Discord user is a registered member
    async fn validate(&self, user_id: u64) -> ValidationStatus;
}

/// `MembershipApi` over HTTP
#[derive(Debug, Clone)]
pub struct OsfDatabaseClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsfDatabaseClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn request(&self, user_id: u64) -> BotResult<ValidationStatus> {
        let response = self
            .client
            .get(format!("{}{VALIDATE_PATH}", self.base_url))
            .json(&ValidateRequest { id: user_id })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            let body: ValidateResponse = response.json().await?;
            Ok(if body.result {
                ValidationStatus::Member
            } else {
                ValidationStatus::NotMember
            })
        } else {
            Ok(error_status(status, response.text().await))
        }
    }
}

/// Error payload for a non-200 answer, keeping body read failures visible
fn error_status<E: std::fmt::Display>(
    status: StatusCode,
    body: Result<String, E>,
) -> ValidationStatus {
    let body = match body {
        Ok(text) => text,
        Err(err) => format!("<unreadable body: {err}>"),
    };
    ValidationStatus::Error(format!("{}: {body}", status.as_u16()))
}

#[async_trait]
impl MembershipApi for OsfDatabaseClient {
    async fn validate(&self, user_id: u64) -> ValidationStatus {
        match self.request(user_id).await {
            Ok(status) => {
                debug!(user_id, %status, "Membership lookup finished");
                status
            }
            Err(err) => {
                warn!(user_id, error = %err, "Membership lookup failed");
                ValidationStatus::Error(err.to_string())
            }
        }
    }
}
