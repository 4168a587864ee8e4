//! HTTP transport for the control plane API.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, ErrorPayload};

/// Correlation id header stamped on every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON transport for the Stratus control plane.
///
/// Wraps a [`reqwest::Client`] with base URL handling, bearer token auth,
/// a fresh correlation id per request, and decoding of the control plane's
/// `{code, err, error}` failure body. Dropping a pending call cancels the
/// in-flight request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
    token: String,
}

impl ApiClient {
    /// Build a client from the given configuration.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let parsed = Url::parse(&config.base_url).map_err(|source| ApiError::BaseUrl {
            url: config.base_url.clone(),
            source,
        })?;
        if !parsed.has_host() {
            return Err(ApiError::BaseUrl {
                url: config.base_url.clone(),
                source: url::ParseError::EmptyHost,
            });
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            http,
            base: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    /// Base URL this client talks to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// GET a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let resp = self.send(Method::GET, path, |r| r).await?;
        decode(path, resp).await
    }

    /// GET a JSON resource with query parameters.
    pub async fn get_json_query<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self.send(Method::GET, path, |r| r.query(query)).await?;
        decode(path, resp).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::POST, path, |r| r.json(body)).await?;
        decode(path, resp).await
    }

    /// POST a JSON body, ignoring the response body.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send(Method::POST, path, |r| r.json(body)).await?;
        Ok(())
    }

    /// PUT a JSON body, ignoring the response body.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send(Method::PUT, path, |r| r.json(body)).await?;
        Ok(())
    }

    /// PATCH a JSON body, ignoring the response body.
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send(Method::PATCH, path, |r| r.json(body)).await?;
        Ok(())
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(Method::DELETE, path, |r| r).await?;
        Ok(())
    }

    /// DELETE with a JSON body, for resources not addressable by path.
    pub async fn delete_with_body<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<()> {
        self.send(Method::DELETE, path, |r| r.json(body)).await?;
        Ok(())
    }

    /// Send a request and check the response status.
    async fn send(
        &self,
        method: Method,
        path: &str,
        shape: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> ApiResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, path, request_id, "Control plane request");

        let req = shape(self.http.request(method.clone(), format!("{}{}", self.base, path)))
            .bearer_auth(&self.token)
            .header(REQUEST_ID_HEADER, &request_id);

        let resp = req.send().await.map_err(|source| ApiError::Request {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        // Non-2xx: decode the remote's error body for the message, falling
        // back to the bare status line when the body is absent or malformed.
        let message = match resp.json::<ErrorPayload>().await {
            Ok(payload) => payload
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };
        warn!(%method, path, %status, request_id, "Control plane rejected request: {}", message);

        Err(ApiError::Status {
            method,
            path: path.to_string(),
            status,
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> ApiResult<T> {
    resp.json::<T>().await.map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}
