use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::remote::rest::{check_status, RestClient};
use crate::remote::RemoteResult;

/// An authenticated staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: String,
}

/// Gate for the booking views: a session is present or it is not.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn current_session(&self) -> RemoteResult<Option<Session>>;
}

#[derive(Debug, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl From<UserPayload> for Session {
    fn from(user: UserPayload) -> Self {
        let full_name = user
            .user_metadata
            .and_then(|m| m.full_name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let display_name = full_name
            .or_else(|| user.email.clone())
            .unwrap_or_else(|| user.id.clone());
        Session { user_id: user.id, email: user.email, display_name }
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: UserPayload,
}

/// Result of a password sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub session: Session,
}

/// The hosted identity service's REST interface.
pub struct SupabaseAuth {
    client: RestClient,
}

impl SupabaseAuth {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<SignedIn> {
        let resp = self
            .client
            .with_bearer(None)
            .request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenPayload = check_status(resp).await?.json().await?;
        let session = Session::from(token.user);
        info!("signed in as {}", session.display_name);
        Ok(SignedIn { access_token: token.access_token, refresh_token: token.refresh_token, session })
    }

    /// Revoke the current token. Without a token there is nothing to revoke.
    pub async fn sign_out(&self) -> RemoteResult<()> {
        if self.client.bearer().is_none() {
            return Ok(());
        }
        let resp = self.client.request(Method::POST, "auth/v1/logout").send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentitySource for SupabaseAuth {
    async fn current_session(&self) -> RemoteResult<Option<Session>> {
        if self.client.bearer().is_none() {
            debug!("no access token, no session");
            return Ok(None);
        }
        let resp = self.client.request(Method::GET, "auth/v1/user").send().await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        let user: UserPayload = check_status(resp).await?.json().await?;
        Ok(Some(Session::from(user)))
    }
}
