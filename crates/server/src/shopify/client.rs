//! HTTP plumbing shared by all Shopify Admin API calls.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;

use crate::db::ShopSession;

use super::{GraphQLError, PlatformError};

/// Shopify Admin API client.
///
/// Cheaply cloneable; holds the shared HTTP client and API version. Shop
/// identity and credentials come from the [`ShopSession`] passed to each
/// call.
#[derive(Clone)]
pub struct PlatformClient {
    inner: Arc<PlatformClientInner>,
}

struct PlatformClientInner {
    client: reqwest::Client,
    api_version: String,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    path: Vec<Value>,
}

impl PlatformClient {
    /// Create a new Admin API client.
    #[must_use]
    pub fn new(api_version: &str) -> Self {
        Self {
            inner: Arc::new(PlatformClientInner {
                client: reqwest::Client::new(),
                api_version: api_version.to_string(),
            }),
        }
    }

    fn rest_url(&self, session: &ShopSession, path: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{path}",
            session.shop, self.inner.api_version
        )
    }

    /// Check rate-limit and auth status before reading a response body.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(PlatformError::RateLimited(retry_after));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PlatformError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let url = response.url().path().to_string();
            return Err(PlatformError::NotFound(url));
        }

        response.error_for_status().map_err(PlatformError::Http)
    }

    /// Execute a REST GET request, returning the parsed JSON body.
    pub(super) async fn rest_get(
        &self,
        session: &ShopSession,
        path: &str,
    ) -> Result<Value, PlatformError> {
        let response = self
            .inner
            .client
            .get(self.rest_url(session, path))
            .header(
                "X-Shopify-Access-Token",
                session.access_token.expose_secret(),
            )
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Execute a REST PUT request with a JSON body.
    pub(super) async fn rest_put(
        &self,
        session: &ShopSession,
        path: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let response = self
            .inner
            .client
            .put(self.rest_url(session, path))
            .header(
                "X-Shopify-Access-Token",
                session.access_token.expose_secret(),
            )
            .json(body)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Execute a REST POST request with a JSON body.
    pub(super) async fn rest_post(
        &self,
        session: &ShopSession,
        path: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let response = self
            .inner
            .client
            .post(self.rest_url(session, path))
            .header(
                "X-Shopify-Access-Token",
                session.access_token.expose_secret(),
            )
            .json(body)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Execute a REST DELETE request.
    pub(super) async fn rest_delete(
        &self,
        session: &ShopSession,
        path: &str,
    ) -> Result<(), PlatformError> {
        let response = self
            .inner
            .client
            .delete(self.rest_url(session, path))
            .header(
                "X-Shopify-Access-Token",
                session.access_token.expose_secret(),
            )
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Execute a GraphQL query or mutation.
    pub(super) async fn graphql(
        &self,
        session: &ShopSession,
        query: &str,
        variables: Value,
    ) -> Result<Value, PlatformError> {
        let endpoint = self.rest_url(session, "graphql.json");

        let response = self
            .inner
            .client
            .post(endpoint)
            .header(
                "X-Shopify-Access-Token",
                session.access_token.expose_secret(),
            )
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let graphql_response: GraphQLResponse =
            Self::check_status(response).await?.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    path: e.path,
                })
                .collect();
            return Err(PlatformError::GraphQL(converted));
        }

        graphql_response.data.ok_or_else(|| {
            PlatformError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    /// Collect mutation user errors from a payload node, if any.
    pub(super) fn user_errors(payload: &Value) -> Option<PlatformError> {
        let errors = payload.get("userErrors")?.as_array()?;
        if errors.is_empty() {
            return None;
        }

        let messages: Vec<String> = errors
            .iter()
            .map(|e| {
                let field = e
                    .get("field")
                    .and_then(Value::as_array)
                    .map_or_else(String::new, |f| {
                        f.iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(".")
                    });
                let message = e.get("message").and_then(Value::as_str).unwrap_or_default();
                format!("{field}: {message}")
            })
            .collect();

        Some(PlatformError::UserError(messages.join("; ")))
    }
}
