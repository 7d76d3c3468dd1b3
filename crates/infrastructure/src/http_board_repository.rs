use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use ticketflow_application::{StatusRepository, TicketRepository};
use ticketflow_core::{AppError, AppResult, TenantId};
use ticketflow_domain::{
    Status, StatusId, StatusPatch, StatusScope, Ticket, TicketFilter, TicketId, TicketPatch,
};
use tracing::{debug, warn};
use url::Url;

mod payloads;

use payloads::{
    Envelope, ReferenceCountPayload, StatusOrderPayload, StatusPayload, TicketPayload,
    ticket_filter_query,
};

const TENANT_HEADER: &str = "x-tenant-id";

/// REST persistence collaborator for statuses and tickets.
///
/// Idempotent reads are retried with linear backoff on transient failures.
/// Writes are sent once; retrying a move is the board synchronizer's call.
pub struct HttpBoardRepository {
    http_client: reqwest::Client,
    base_url: Url,
    api_token: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpBoardRepository {
    /// Creates a repository talking to `base_url`.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        api_token: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid persistence base url '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "persistence base url '{base_url}' cannot carry a path"
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            api_token: api_token.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!(
                    "persistence base url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);

        Ok(url)
    }

    async fn send<T>(
        &self,
        method: Method,
        url: Url,
        tenant_id: TenantId,
        body: Option<&Value>,
    ) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let max_attempts = if method == Method::GET {
            self.max_attempts
        } else {
            1
        };
        let mut attempt = 0_u8;

        loop {
            attempt = attempt.saturating_add(1);
            let mut builder = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(self.api_token.as_str())
                .header(TENANT_HEADER, tenant_id.to_string());
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let result = match builder.send().await {
                Ok(response) => decode_response(response).await,
                Err(error) => Err(AppError::TransientNetwork(format!(
                    "{method} {} transport error: {error}",
                    url.path()
                ))),
            };

            match result {
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    warn!(
                        method = %method,
                        path = url.path(),
                        attempt,
                        delay_ms = delay,
                        error = %error,
                        "retrying persistence request"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                other => return other,
            }
        }
    }

    async fn send_expecting<T>(
        &self,
        method: Method,
        url: Url,
        tenant_id: TenantId,
        body: Option<&Value>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let path = url.path().to_owned();
        self.send(method, url, tenant_id, body)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!("persistence reported success for '{path}' without data"))
            })
    }
}

async fn decode_response<T>(response: reqwest::Response) -> AppResult<Option<T>>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await.map_err(|error| {
        AppError::TransientNetwork(format!("persistence response body unavailable: {error}"))
    })?;

    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or(body);
        return Err(error_for_status(status, message));
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|error| {
        AppError::Internal(format!("persistence response is not a valid envelope: {error}"))
    })?;
    if !envelope.success {
        return Err(AppError::Validation(envelope.message.unwrap_or_else(|| {
            "persistence rejected the request without a message".to_owned()
        })));
    }

    Ok(envelope.data)
}

/// Maps a non-success HTTP status to the error taxonomy.
fn error_for_status(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::Validation(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::PermissionDenied(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::TransientNetwork(format!("rate limited: {message}"))
        }
        status if status.is_server_error() => {
            AppError::TransientNetwork(format!("transient HTTP status {status}: {message}"))
        }
        status => AppError::Internal(format!("unexpected HTTP status {status}: {message}")),
    }
}

fn encode_body<T>(value: &T) -> AppResult<Value>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to encode request body: {error}")))
}

fn not_found_as_none<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(error) => Err(error),
    }
}

#[async_trait]
impl StatusRepository for HttpBoardRepository {
    async fn fetch_statuses(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
    ) -> AppResult<Vec<Status>> {
        let mut url = self.endpoint(&["statuses"])?;
        url.query_pairs_mut()
            .append_pair("scope", scope.as_query_value().as_str());

        let payloads: Vec<StatusPayload> = self
            .send_expecting(Method::GET, url, tenant_id, None)
            .await?;
        debug!(tenant_id = %tenant_id, scope = %scope, count = payloads.len(), "statuses fetched");

        payloads
            .into_iter()
            .map(StatusPayload::into_status)
            .collect()
    }

    async fn find_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<Option<Status>> {
        let url = self.endpoint(&["statuses", status_id.as_str()])?;
        let payload = not_found_as_none(
            self.send_expecting::<StatusPayload>(Method::GET, url, tenant_id, None)
                .await,
        )?;

        payload.map(StatusPayload::into_status).transpose()
    }

    async fn create_status(&self, tenant_id: TenantId, status: Status) -> AppResult<Status> {
        let url = self.endpoint(&["statuses"])?;
        let body = encode_body(&StatusPayload::from_status(&status))?;

        let stored: StatusPayload = self
            .send_expecting(Method::POST, url, tenant_id, Some(&body))
            .await?;
        stored.into_status()
    }

    async fn update_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
        patch: &StatusPatch,
    ) -> AppResult<Status> {
        let url = self.endpoint(&["statuses", status_id.as_str()])?;
        let body = encode_body(patch)?;

        let stored: StatusPayload = self
            .send_expecting(Method::PATCH, url, tenant_id, Some(&body))
            .await?;
        stored.into_status()
    }

    async fn delete_status(&self, tenant_id: TenantId, status_id: &StatusId) -> AppResult<()> {
        let url = self.endpoint(&["statuses", status_id.as_str()])?;
        self.send::<Value>(Method::DELETE, url, tenant_id, None)
            .await
            .map(|_| ())
    }

    async fn save_status_order(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
        ordered_ids: &[StatusId],
    ) -> AppResult<()> {
        let url = self.endpoint(&["statuses", "order"])?;
        let body = encode_body(&StatusOrderPayload {
            scope: scope.as_query_value(),
            ordered_ids: ordered_ids
                .iter()
                .map(|status_id| status_id.as_str().to_owned())
                .collect(),
        })?;

        self.send::<Value>(Method::PUT, url, tenant_id, Some(&body))
            .await
            .map(|_| ())
    }

    async fn count_status_references(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<u64> {
        let url = self.endpoint(&["statuses", status_id.as_str(), "references"])?;
        let payload: ReferenceCountPayload = self
            .send_expecting(Method::GET, url, tenant_id, None)
            .await?;

        Ok(payload.count)
    }
}

#[async_trait]
impl TicketRepository for HttpBoardRepository {
    async fn fetch_tickets(
        &self,
        tenant_id: TenantId,
        filter: &TicketFilter,
    ) -> AppResult<Vec<Ticket>> {
        let mut url = self.endpoint(&["tickets"])?;
        let query = ticket_filter_query(filter);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let payloads: Vec<TicketPayload> = self
            .send_expecting(Method::GET, url, tenant_id, None)
            .await?;
        debug!(tenant_id = %tenant_id, count = payloads.len(), "tickets fetched");

        payloads
            .into_iter()
            .map(TicketPayload::into_ticket)
            .collect()
    }

    async fn find_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> AppResult<Option<Ticket>> {
        let url = self.endpoint(&["tickets", ticket_id.as_str()])?;
        let payload = not_found_as_none(
            self.send_expecting::<TicketPayload>(Method::GET, url, tenant_id, None)
                .await,
        )?;

        payload.map(TicketPayload::into_ticket).transpose()
    }

    async fn create_ticket(&self, tenant_id: TenantId, ticket: Ticket) -> AppResult<Ticket> {
        let url = self.endpoint(&["tickets"])?;
        let body = encode_body(&TicketPayload::from_ticket(&ticket))?;

        let stored: TicketPayload = self
            .send_expecting(Method::POST, url, tenant_id, Some(&body))
            .await?;
        stored.into_ticket()
    }

    async fn patch_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        patch: &TicketPatch,
    ) -> AppResult<Ticket> {
        let url = self.endpoint(&["tickets", ticket_id.as_str()])?;
        let body = encode_body(patch)?;

        let stored: TicketPayload = self
            .send_expecting(Method::PATCH, url, tenant_id, Some(&body))
            .await?;
        stored.into_ticket()
    }
}
