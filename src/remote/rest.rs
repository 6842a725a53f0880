use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use crate::config::Config;
use crate::model::{AuditEntry, ReservationId};

use super::{AuditSource, RemoteError, RemoteResult, ReservationRow, ReservationTable};

/// HTTP access to the hosted database/identity service. Every request carries
/// the `apikey` header; the bearer is the user's session token when known,
/// otherwise the access key itself.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
    bearer: Option<String>,
}

impl RestClient {
    pub fn new(config: &Config) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base: config.api_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bearer: config.access_token.clone(),
        })
    }

    /// Same client, authenticated as a different session.
    pub fn with_bearer(&self, token: Option<String>) -> Self {
        Self { bearer: token, ..self.clone() }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        let bearer = self.bearer.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("authorization", format!("Bearer {bearer}"))
    }
}

/// Turn any non-2xx response into `RemoteError::Status`.
pub(crate) async fn check_status(resp: Response) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status { status: status.as_u16(), body })
}

/// `reservas` through the REST query interface.
pub struct PostgrestTable {
    client: RestClient,
    path: String,
}

impl PostgrestTable {
    pub fn new(client: RestClient, table: &str) -> Self {
        Self { client, path: format!("rest/v1/{table}") }
    }
}

#[async_trait]
impl ReservationTable for PostgrestTable {
    async fn select_all(&self) -> RemoteResult<Vec<serde_json::Value>> {
        let resp = self
            .client
            .request(Method::GET, &self.path)
            .query(&[("select", "*")])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check_status(resp).await?.json().await?;
        debug!("select returned {} rows", rows.len());
        Ok(rows)
    }

    async fn upsert(&self, rows: &[ReservationRow]) -> RemoteResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let resp = self
            .client
            .request(Method::POST, &self.path)
            .query(&[("on_conflict", "id")])
            .header("prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete(&self, id: &ReservationId) -> RemoteResult<()> {
        let resp = self
            .client
            .request(Method::DELETE, &self.path)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Change history rows written by the remote side's audit trigger.
pub struct PostgrestAudit {
    client: RestClient,
    path: String,
}

impl PostgrestAudit {
    pub fn new(client: RestClient, table: &str) -> Self {
        Self { client, path: format!("rest/v1/{table}") }
    }
}

#[async_trait]
impl AuditSource for PostgrestAudit {
    async fn history(&self, id: &ReservationId) -> RemoteResult<Vec<AuditEntry>> {
        let resp = self
            .client
            .request(Method::GET, &self.path)
            .query(&[
                ("select", "action,changed_at,actor,changed_fields".to_string()),
                ("reservation_id", format!("eq.{id}")),
                ("order", "changed_at.asc".to_string()),
            ])
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }
}
