//! REST venue client with retry logic.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::{ApiErrorResponse, ApiFillActivity, ApiOrder, ApiOrderRequest, ApiPosition};
use super::error::HttpVenueError;
use super::retry::ExponentialBackoff;
use crate::application::ports::{
    BrokerVenuePort, FillPage, FillQuery, OrderLookup, VenueError, VenueOrder, VenueOrderRequest,
    VenuePosition,
};
use crate::config::{RetryConfig, VenueConfig};
use crate::domain::shared::VenueOrderId;

/// Which failures a request may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryScope {
    /// Reads: any transient failure.
    Transient,
    /// Order placement: only refusals that prove the venue did not act.
    RefusalOnly,
}

/// REST implementation of `BrokerVenuePort`.
#[derive(Debug, Clone)]
pub struct HttpVenueClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    retry: RetryConfig,
}

impl HttpVenueClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or credentials are missing.
    pub fn new(config: &VenueConfig) -> Result<Self, HttpVenueError> {
        if config.base_url.trim().is_empty() {
            return Err(HttpVenueError::Config("base_url is empty".to_string()));
        }
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(HttpVenueError::AuthenticationFailed);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| HttpVenueError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            retry: config.retry.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpVenueError> {
        self.request(Method::GET, path, query, None::<&()>, RetryScope::Transient)
            .await
    }

    #[allow(clippy::too_many_lines)]
    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        scope: RetryScope,
    ) -> Result<T, HttpVenueError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if scope == RetryScope::Transient {
                        if let Some(delay) = backoff.next_backoff() {
                            tracing::warn!(
                                error = %e,
                                delay_ms = delay.as_millis(),
                                attempt = backoff.attempt(),
                                "Network error, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    if e.is_timeout() {
                        return Err(HttpVenueError::Timeout);
                    }
                    return Err(HttpVenueError::Network(e.to_string()));
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| HttpVenueError::Network(e.to_string()))?;
                let text = if text.is_empty() { "null" } else { text.as_str() };
                return serde_json::from_str(text)
                    .map_err(|e| HttpVenueError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();
            let (error_code, error_message) =
                match serde_json::from_str::<ApiErrorResponse>(&error_body) {
                    Ok(err) => (
                        err.code
                            .map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
                        err.message,
                    ),
                    Err(_) => (status.as_u16().to_string(), error_body),
                };

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    if let Some(delay) = backoff.next_backoff() {
                        let delay = retry_after.map_or(delay, Duration::from_secs);
                        tracing::warn!(
                            code = %error_code,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(HttpVenueError::RateLimited);
                }
                ErrorCategory::Retryable => {
                    if scope == RetryScope::Transient {
                        if let Some(delay) = backoff.next_backoff() {
                            tracing::warn!(
                                code = %error_code,
                                message = %error_message,
                                delay_ms = delay.as_millis(),
                                "Retryable error, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(HttpVenueError::MaxRetriesExceeded {
                            attempts: backoff.attempt(),
                        });
                    }
                    return Err(HttpVenueError::Api {
                        code: error_code,
                        message: error_message,
                    });
                }
                ErrorCategory::NonRetryable => {
                    return match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            Err(HttpVenueError::AuthenticationFailed)
                        }
                        StatusCode::NOT_FOUND => Err(HttpVenueError::NotFound {
                            path: path.to_string(),
                        }),
                        StatusCode::UNPROCESSABLE_ENTITY => {
                            Err(HttpVenueError::OrderRejected(error_message))
                        }
                        _ => Err(HttpVenueError::Api {
                            code: error_code,
                            message: error_message,
                        }),
                    };
                }
            }
        }
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

#[async_trait]
impl BrokerVenuePort for HttpVenueClient {
    async fn submit(&self, request: VenueOrderRequest) -> Result<VenueOrder, VenueError> {
        let body = ApiOrderRequest::from(&request);
        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = body.side,
            order_type = body.order_type,
            qty = %body.qty,
            limit_price = ?body.limit_price,
            "Submitting order to venue"
        );

        let response: ApiOrder = self
            .request(Method::POST, "/v2/orders", &[], Some(&body), RetryScope::RefusalOnly)
            .await?;
        let order = response.into_venue_order()?;

        tracing::info!(
            client_order_id = %order.client_order_id,
            venue_order_id = %order.venue_order_id,
            status = ?order.status,
            "Order accepted by venue"
        );
        Ok(order)
    }

    async fn cancel(&self, venue_order_id: &VenueOrderId) -> Result<(), VenueError> {
        let path = format!("/v2/orders/{venue_order_id}");
        let _: serde_json::Value = self
            .request(Method::DELETE, &path, &[], None::<&()>, RetryScope::Transient)
            .await?;
        tracing::info!(venue_order_id = %venue_order_id, "Cancel requested");
        Ok(())
    }

    async fn get_order(&self, lookup: &OrderLookup) -> Result<VenueOrder, VenueError> {
        let response: ApiOrder = match lookup {
            OrderLookup::Venue(id) => self.get(&format!("/v2/orders/{id}"), &[]).await?,
            OrderLookup::Client(id) => {
                self.get(
                    "/v2/orders:by_client_order_id",
                    &[("client_order_id", id.to_string())],
                )
                .await?
            }
        };
        Ok(response.into_venue_order()?)
    }

    async fn get_fills(&self, query: &FillQuery) -> Result<FillPage, VenueError> {
        let mut params = vec![
            ("after", query.since.to_rfc3339()),
            ("until", query.until.to_rfc3339()),
            ("direction", "asc".to_string()),
            ("page_size", query.page_size.to_string()),
        ];
        if let Some(id) = &query.venue_order_id {
            params.push(("order_id", id.to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("page_token", token.clone()));
        }

        let activities: Vec<ApiFillActivity> =
            self.get("/v2/account/activities/FILL", &params).await?;
        let full_page = activities.len() >= query.page_size as usize;
        let next_page_token = if full_page {
            activities.last().map(|a| a.id.clone())
        } else {
            None
        };
        let fills = activities
            .into_iter()
            .map(ApiFillActivity::into_venue_fill)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FillPage {
            fills,
            next_page_token,
        })
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, VenueError> {
        let positions: Vec<ApiPosition> = self.get("/v2/positions", &[]).await?;
        Ok(positions
            .into_iter()
            .map(ApiPosition::into_venue_position)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
