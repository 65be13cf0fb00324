//! HTTP client for the Azure Resource Manager API.
//!
//! This module provides [`ManagementClient`], the main entry point for
//! sending requests to management endpoints. The client attaches the
//! standard headers, retries failed attempts, and turns error responses
//! into [`ManagementError`] values.
//!
//! # Examples
//!
//! ## Fetching a resource group
//! ```rust,no_run
//! use azure_rm_management::client::ManagementClient;
//! use azure_rm_management::config::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ManagementClient::new(
//!     "00000000-0000-0000-0000-000000000000",
//!     "my-app-id",
//!     "my-app-secret",
//!     "my-resource-group",
//!     ClientConfig::default(),
//! )?;
//!
//! let url = client.resource_group_url("?api-version=2021-04-01")?;
//! let body = client.get(url.as_str()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Tuning retries and timeouts
//! ```rust,no_run
//! use azure_rm_management::client::ManagementClient;
//! use azure_rm_management::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ManagementClient::builder()
//!     .subscription_id("00000000-0000-0000-0000-000000000000")
//!     .application_secret("my-app-secret")
//!     .read_timeout(Duration::from_secs(30))
//!     .retry_policy(RetryPolicy::exponential(3, Duration::from_millis(500)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::error::{ManagementError, ManagementResult};
use crate::request::{build_request, Method, OutgoingRequest};
use crate::response::{AzureErrorClassifier, ErrorClassifier, Response};
use crate::retry::{send_with_retry, RetryContext, RetryPolicy};
use crate::transport::{ReqwestTransport, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client as HttpClient, StatusCode};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use url::Url;

use std::sync::Arc;
use std::time::Duration;

/// The operations exposed by a management client.
///
/// Implemented by [`ManagementClient`]; code that only needs to issue
/// requests can depend on this trait and substitute a fake in tests.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Send a GET request and return the response body.
    async fn get(&self, url: &str) -> ManagementResult<Bytes>;

    /// Send a PUT request, discarding the response body.
    async fn put(&self, url: &str, data: Bytes) -> ManagementResult<()>;

    /// Send a PUT request and return the response body.
    async fn put_with_response(&self, url: &str, data: Bytes) -> ManagementResult<Bytes>;

    /// Send a DELETE request, discarding the response body.
    async fn delete(&self, url: &str) -> ManagementResult<()>;
}

/// The client for the Azure Resource Manager API.
///
/// Immutable once built. Every call builds its own request and retry
/// budget, so a single client can be shared across tasks. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    credentials: Credentials,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn ErrorClassifier>,
    retry_policy: RetryPolicy,
    accepted_statuses: Vec<StatusCode>,
}

/// Builder for constructing a [`ManagementClient`].
///
/// Use [`ManagementClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ManagementClientBuilder {
    subscription_id: Option<String>,
    application_id: Option<String>,
    application_secret: Option<SecretString>,
    resource_group: Option<String>,
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    http_client: Option<HttpClient>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    accepted_statuses: Vec<StatusCode>,
}

impl ManagementClient {
    /// Create a client with the default transport and retry policy.
    ///
    /// No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] if `subscription_id` or
    /// `application_secret` is empty. The configuration itself is never
    /// rejected here.
    pub fn new(
        subscription_id: impl Into<String>,
        application_id: impl Into<String>,
        application_secret: impl Into<String>,
        resource_group: impl Into<String>,
        config: ClientConfig,
    ) -> ManagementResult<Self> {
        Self::builder()
            .subscription_id(subscription_id)
            .application_id(application_id)
            .application_secret(application_secret)
            .resource_group(resource_group)
            .config(config)
            .build()
    }

    /// Create a new builder for configuring a `ManagementClient`.
    pub fn builder() -> ManagementClientBuilder {
        ManagementClientBuilder::default()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn subscription_id(&self) -> &str {
        self.credentials.subscription_id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Error statuses that are handed back as ordinary responses.
    pub fn accepted_statuses(&self) -> &[StatusCode] {
        &self.accepted_statuses
    }

    /// Build `{base}/subscriptions/{subscription}/{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] if the management base URL
    /// does not parse, or [`ManagementError::InvalidArgument`] if the result
    /// is not a valid URL.
    pub fn subscription_url(&self, path: &str) -> ManagementResult<Url> {
        self.scoped_url(
            &format!("subscriptions/{}", self.credentials.subscription_id()),
            path,
        )
    }

    /// Build `{base}/subscriptions/{subscription}/resourceGroups/{group}/{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidArgument`] if no resource group is
    /// configured or the result is not a valid URL, and
    /// [`ManagementError::Configuration`] if the management base URL does not
    /// parse.
    pub fn resource_group_url(&self, path: &str) -> ManagementResult<Url> {
        if self.credentials.resource_group().is_empty() {
            return Err(ManagementError::missing("resource group"));
        }
        self.scoped_url(
            &format!(
                "subscriptions/{}/resourceGroups/{}",
                self.credentials.subscription_id(),
                self.credentials.resource_group()
            ),
            path,
        )
    }

    fn scoped_url(&self, scope: &str, path: &str) -> ManagementResult<Url> {
        let management_url = self.config.management_url()?;
        let base = management_url.as_str().trim_end_matches('/');
        let url = match path.trim_start_matches('/') {
            "" => format!("{base}/{scope}"),
            rest if rest.starts_with('?') => format!("{base}/{scope}{rest}"),
            rest => format!("{base}/{scope}/{rest}"),
        };
        Url::parse(&url)
            .map_err(|e| ManagementError::InvalidArgument(format!("invalid url {url:?}: {e}")))
    }

    /// Build a request carrying this client's standard headers.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidArgument`] when `url` or `method` is
    /// empty or malformed.
    pub fn build_request(
        &self,
        url: &str,
        method: &str,
        body: Option<Bytes>,
    ) -> ManagementResult<OutgoingRequest> {
        build_request(&self.config, url, method, body)
    }

    /// Borrow the client with a cancellation token attached.
    ///
    /// Cancelling the token aborts an in-flight attempt or backoff delay
    /// with [`ManagementError::Cancelled`].
    pub fn with_cancellation(&self, token: CancellationToken) -> Cancellable<'_> {
        Cancellable {
            client: self,
            token,
        }
    }

    /// Send a GET request and return the response body.
    pub async fn get(&self, url: &str) -> ManagementResult<Bytes> {
        self.with_cancellation(CancellationToken::new())
            .get(url)
            .await
    }

    /// Send a PUT request with `data` as the body, discarding the response body.
    pub async fn put(&self, url: &str, data: impl Into<Bytes>) -> ManagementResult<()> {
        self.with_cancellation(CancellationToken::new())
            .put(url, data)
            .await
    }

    /// Send a PUT request with `data` as the body and return the response body.
    pub async fn put_with_response(
        &self,
        url: &str,
        data: impl Into<Bytes>,
    ) -> ManagementResult<Bytes> {
        self.with_cancellation(CancellationToken::new())
            .put_with_response(url, data)
            .await
    }

    /// Send a DELETE request, discarding the response body.
    pub async fn delete(&self, url: &str) -> ManagementResult<()> {
        self.with_cancellation(CancellationToken::new())
            .delete(url)
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> ManagementResult<Response> {
        let request = self.build_request(url, method.as_str(), body)?;
        let ctx = RetryContext {
            transport: self.transport.as_ref(),
            classifier: self.classifier.as_ref(),
            policy: &self.retry_policy,
            accepted_statuses: &self.accepted_statuses,
        };
        send_with_retry(&ctx, &request, self.retry_policy.max_retries, cancel).await
    }
}

/// A [`ManagementClient`] bound to a cancellation token.
///
/// Created by [`ManagementClient::with_cancellation`].
#[derive(Debug, Clone)]
pub struct Cancellable<'a> {
    client: &'a ManagementClient,
    token: CancellationToken,
}

impl Cancellable<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Send a GET request and return the response body.
    #[tracing::instrument(name = "management::get", skip(self))]
    pub async fn get(&self, url: &str) -> ManagementResult<Bytes> {
        let response = self
            .client
            .dispatch(Method::Get, url, None, &self.token)
            .await?;
        let body = response.read_body().await?;
        tracing::debug!(len = body.len(), "response received");
        Ok(body)
    }

    /// Send a PUT request, discarding the response body.
    #[tracing::instrument(name = "management::put", skip(self, data))]
    pub async fn put(&self, url: &str, data: impl Into<Bytes>) -> ManagementResult<()> {
        self.client
            .dispatch(Method::Put, url, Some(data.into()), &self.token)
            .await?;
        Ok(())
    }

    /// Send a PUT request and return the response body.
    #[tracing::instrument(name = "management::put_with_response", skip(self, data))]
    pub async fn put_with_response(
        &self,
        url: &str,
        data: impl Into<Bytes>,
    ) -> ManagementResult<Bytes> {
        let response = self
            .client
            .dispatch(Method::Put, url, Some(data.into()), &self.token)
            .await?;
        response.read_body().await
    }

    /// Send a DELETE request, discarding the response body.
    #[tracing::instrument(name = "management::delete", skip(self))]
    pub async fn delete(&self, url: &str) -> ManagementResult<()> {
        self.client
            .dispatch(Method::Delete, url, None, &self.token)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ManagementApi for ManagementClient {
    async fn get(&self, url: &str) -> ManagementResult<Bytes> {
        ManagementClient::get(self, url).await
    }

    async fn put(&self, url: &str, data: Bytes) -> ManagementResult<()> {
        ManagementClient::put(self, url, data).await
    }

    async fn put_with_response(&self, url: &str, data: Bytes) -> ManagementResult<Bytes> {
        ManagementClient::put_with_response(self, url, data).await
    }

    async fn delete(&self, url: &str) -> ManagementResult<()> {
        ManagementClient::delete(self, url).await
    }
}

impl ManagementClientBuilder {
    /// Set the subscription ID. Required.
    pub fn subscription_id(mut self, id: impl Into<String>) -> Self {
        self.subscription_id = Some(id.into());
        self
    }

    /// Set the application (client) ID of the service principal.
    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = Some(id.into());
        self
    }

    /// Set the application secret. Required.
    pub fn application_secret(mut self, secret: impl Into<String>) -> Self {
        self.application_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the resource group used by [`ManagementClient::resource_group_url`].
    pub fn resource_group(mut self, group: impl Into<String>) -> Self {
        self.resource_group = Some(group.into());
        self
    }

    /// Set the endpoint and header configuration.
    ///
    /// Defaults to [`ClientConfig::default()`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom [`Transport`].
    ///
    /// **Note:** This takes precedence over [`http_client`](Self::http_client)
    /// and the timeout settings.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) will be ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom [`ErrorClassifier`] instead of [`AzureErrorClassifier`].
    pub fn error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    ///
    /// It covers the entire request/response cycle of one attempt, including
    /// reading the body.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy.
    ///
    /// Defaults to 5 immediate retries.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Treat `status` as a successful response instead of an error.
    pub fn accept_status(mut self, status: StatusCode) -> Self {
        if !self.accepted_statuses.contains(&status) {
            self.accepted_statuses.push(status);
        }
        self
    }

    /// Build the `ManagementClient`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] if:
    /// - The subscription ID is missing or empty
    /// - The application secret is missing or empty
    /// - The default HTTP client cannot be built
    pub fn build(self) -> ManagementResult<ManagementClient> {
        let credentials = Credentials::from_secret(
            self.subscription_id.unwrap_or_default(),
            self.application_id.unwrap_or_default(),
            self.application_secret
                .unwrap_or_else(|| SecretString::from(String::new())),
            self.resource_group.unwrap_or_default(),
        )?;

        let transport: Arc<dyn Transport> = match (self.transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(ReqwestTransport::new(http)),
            (None, None) => Arc::new(ReqwestTransport::with_timeouts(
                self.connect_timeout
                    .unwrap_or(crate::config::DEFAULT_CONNECT_TIMEOUT),
                self.read_timeout
                    .unwrap_or(crate::config::DEFAULT_READ_TIMEOUT),
            )?),
        };

        Ok(ManagementClient {
            credentials,
            config: self.config.unwrap_or_default(),
            transport,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(AzureErrorClassifier)),
            retry_policy: self.retry_policy.unwrap_or_default(),
            accepted_statuses: self.accepted_statuses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeTransport;
    use crate::response::Response;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_transport(transport: Arc<dyn Transport>) -> ManagementClient {
        ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .transport(transport)
            .build()
            .expect("should build")
    }

    // --- Construction tests ---

    #[test]
    fn new_stores_credentials() {
        let client = ManagementClient::new("sub1", "app1", "secret1", "rg1", ClientConfig::default())
            .expect("should build");

        assert_eq!(client.subscription_id(), "sub1");
        assert_eq!(client.credentials().application_id(), "app1");
        assert_eq!(client.credentials().resource_group(), "rg1");
    }

    #[test]
    fn new_requires_subscription_id() {
        let result = ManagementClient::new("", "app1", "secret1", "rg1", ClientConfig::default());
        assert!(matches!(result, Err(ManagementError::Configuration(_))));
    }

    #[test]
    fn new_requires_application_secret() {
        let result = ManagementClient::new("sub1", "app1", "", "rg1", ClientConfig::default());
        assert!(matches!(result, Err(ManagementError::Configuration(_))));
    }

    #[test]
    fn builder_requires_secret_to_be_set() {
        let result = ManagementClient::builder().subscription_id("sub1").build();
        assert!(matches!(result, Err(ManagementError::Configuration(_))));
    }

    #[test]
    fn new_accepts_empty_config() {
        let config = ClientConfig {
            token_url: String::new(),
            management_base_url: String::new(),
            user_agent: String::new(),
            api_version: None,
        };
        let client = ManagementClient::new(
            "subscription",
            "applicationId",
            "applicationSecret",
            "resourceGroup",
            config,
        )
        .expect("empty config should not fail construction");

        assert_eq!(client.subscription_id(), "subscription");
    }

    #[test]
    fn unparsable_base_url_fails_when_composing_urls() {
        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .resource_group("rg1")
            .config(ClientConfig::default().with_management_base_url("::nope::"))
            .build()
            .expect("construction ignores the base URL");

        assert!(matches!(
            client.subscription_url("providers"),
            Err(ManagementError::Configuration(_))
        ));
        assert!(matches!(
            client.resource_group_url(""),
            Err(ManagementError::Configuration(_))
        ));
    }

    #[test]
    fn builder_defaults() {
        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .build()
            .expect("should build");

        assert_eq!(client.retry_policy().max_retries, 5);
        assert_eq!(client.config(), &ClientConfig::default());
        assert!(client.accepted_statuses().is_empty());
    }

    #[test]
    fn builder_accepts_timeouts_and_custom_http_client() {
        let custom_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .build()
            .expect("should build custom client");

        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .http_client(custom_client)
            .connect_timeout(Duration::from_secs(99))
            .read_timeout(Duration::from_secs(99))
            .build()
            .expect("should build");

        assert_eq!(client.subscription_id(), "sub1");
    }

    #[test]
    fn accept_status_deduplicates() {
        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .accept_status(StatusCode::NOT_FOUND)
            .accept_status(StatusCode::NOT_FOUND)
            .build()
            .expect("should build");

        assert_eq!(client.accepted_statuses(), &[StatusCode::NOT_FOUND]);
    }

    #[test]
    fn client_is_cloneable() {
        let client = ManagementClient::new("sub1", "app1", "secret1", "rg1", ClientConfig::default())
            .expect("should build");
        let cloned = client.clone();
        assert_eq!(client.subscription_id(), cloned.subscription_id());
    }

    #[test]
    fn debug_output_hides_secret() {
        let client =
            ManagementClient::new("sub1", "app1", "hunter2-secret", "rg1", ClientConfig::default())
                .expect("should build");
        assert!(!format!("{:?}", client).contains("hunter2-secret"));
        assert!(!format!("{:?}", ManagementClient::builder().application_secret("hunter2-secret"))
            .contains("hunter2-secret"));
    }

    // --- URL composition tests ---

    #[test]
    fn subscription_url_joins_path() {
        let client = ManagementClient::new("sub1", "app1", "secret1", "rg1", ClientConfig::default())
            .expect("should build");

        assert_eq!(
            client
                .subscription_url("/providers/Microsoft.Compute?api-version=2021-04-01")
                .expect("valid")
                .as_str(),
            "https://management.azure.com/subscriptions/sub1/providers/Microsoft.Compute?api-version=2021-04-01"
        );
        assert_eq!(
            client.subscription_url("").expect("valid").as_str(),
            "https://management.azure.com/subscriptions/sub1"
        );
    }

    #[test]
    fn resource_group_url_joins_path() {
        let client = ManagementClient::new("sub1", "app1", "secret1", "rg1", ClientConfig::default())
            .expect("should build");

        assert_eq!(
            client
                .resource_group_url("providers/Microsoft.Network/virtualNetworks/vnet1")
                .expect("valid")
                .as_str(),
            "https://management.azure.com/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1"
        );
        assert_eq!(
            client
                .resource_group_url("?api-version=2021-04-01")
                .expect("valid")
                .as_str(),
            "https://management.azure.com/subscriptions/sub1/resourceGroups/rg1?api-version=2021-04-01"
        );
    }

    #[test]
    fn resource_group_url_requires_group() {
        let client = ManagementClient::new("sub1", "app1", "secret1", "", ClientConfig::default())
            .expect("should build");
        assert!(matches!(
            client.resource_group_url("x"),
            Err(ManagementError::InvalidArgument(_))
        ));
    }

    #[test]
    fn build_request_uses_client_user_agent() {
        let client = ManagementClient::new(
            "sub1",
            "app1",
            "secret1",
            "rg1",
            ClientConfig::default().with_user_agent("custom-agent/2.0"),
        )
        .expect("should build");

        let request = client
            .build_request("https://management.azure.com/x", "PUT", None)
            .expect("should build request");
        assert_eq!(request.headers["user-agent"], "custom-agent/2.0");
        assert_eq!(request.headers["content-type"], "application/json");
    }

    // --- Wiremock integration tests ---

    async fn setup_mock_client(server: &MockServer) -> ManagementClient {
        ManagementClient::new(
            "sub1",
            "app1",
            "secret1",
            "rg1",
            ClientConfig::default()
                .with_management_base_url(server.uri())
                .with_user_agent("azure-rm-test"),
        )
        .expect("should build client")
    }

    #[tokio::test]
    async fn get_request_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub1/resourceGroups/rg1"))
            .and(header("user-agent", "azure-rm-test"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let url = client.resource_group_url("").expect("valid");
        let body = client.get(url.as_str()).await.expect("should succeed");

        assert_eq!(&body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn put_sends_body_and_discards_response() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/subscriptions/sub1/resourceGroups/rg1"))
            .and(body_bytes(br#"{"location":"westeurope"}"#.to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"rg1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let url = client.resource_group_url("").expect("valid");
        client
            .put(url.as_str(), &br#"{"location":"westeurope"}"#[..])
            .await
            .expect("should succeed");
    }

    #[tokio::test]
    async fn put_with_response_returns_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/subscriptions/sub1/resourceGroups/rg1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"rg1"}"#))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let url = client.resource_group_url("").expect("valid");
        let body = client
            .put_with_response(url.as_str(), r#"{"location":"westeurope"}"#)
            .await
            .expect("should succeed");

        assert_eq!(&body[..], br#"{"id":"rg1"}"#);
    }

    #[tokio::test]
    async fn delete_request_success() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/subscriptions/sub1/resourceGroups/rg1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let url = client.resource_group_url("").expect("valid");
        client.delete(url.as_str()).await.expect("should succeed");
    }

    #[tokio::test]
    async fn api_error_is_retried_then_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(409)
                    .insert_header("x-ms-request-id", "req-123")
                    .set_body_json(serde_json::json!({
                        "error": {
                            "code": "Conflict",
                            "message": "Operation in progress"
                        }
                    })),
            )
            .expect(6)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client
            .get(&format!("{}/conflict", server.uri()))
            .await
            .unwrap_err();

        match err {
            ManagementError::Api {
                status,
                code,
                message,
                request_id,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code, "Conflict");
                assert_eq!(message, "Operation in progress");
                assert_eq!(request_id.as_deref(), Some("req-123"));
            }
            _ => panic!("Expected Api error, got {:?}", err),
        }
    }

    #[tokio::test]
    async fn put_with_unrecognized_500_exhausts_retries() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(6)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client
            .put(&format!("{}/resource", server.uri()), "{}")
            .await
            .unwrap_err();

        match err {
            ManagementError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            _ => panic!("Expected Http error, got {:?}", err),
        }
    }

    #[tokio::test]
    async fn get_retries_on_503_then_succeeds() {
        let server = MockServer::start().await;
        let request_count = Arc::new(AtomicU32::new(0));
        let counter = request_count.clone();

        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    ResponseTemplate::new(503).set_body_string("Service Unavailable")
                } else {
                    ResponseTemplate::new(200).set_body_string("OK")
                }
            })
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let body = client
            .get(&server.uri())
            .await
            .expect("should succeed after retries");

        assert_eq!(&body[..], b"OK");
        assert_eq!(request_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delete_accepts_whitelisted_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .accept_status(StatusCode::NOT_FOUND)
            .build()
            .expect("should build");

        client
            .delete(&format!("{}/gone", server.uri()))
            .await
            .expect("404 is accepted");
    }

    #[tokio::test]
    async fn api_version_header_is_sent_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("x-ms-version", "2021-04-01"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ManagementClient::new(
            "sub1",
            "app1",
            "secret1",
            "rg1",
            ClientConfig::default().with_api_version("2021-04-01"),
        )
        .expect("should build");

        client.get(&server.uri()).await.expect("should succeed");
    }

    // --- Fake transport tests ---

    #[tokio::test]
    async fn transport_failure_surfaces_after_six_attempts() {
        let transport = Arc::new(FakeTransport::new(|_| Err("connection refused".into())));
        let client = client_with_transport(transport.clone());

        let err = client
            .get("https://management.azure.com/subscriptions/sub1")
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Transport(_)));
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(Response::from_bytes(StatusCode::OK, r#"{"ok":true}"#))
        }));
        let client = client_with_transport(transport.clone());

        let body = client
            .get("https://management.azure.com/subscriptions/sub1")
            .await
            .expect("should succeed");

        assert_eq!(&body[..], br#"{"ok":true}"#);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_transport() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(Response::from_bytes(StatusCode::OK, ""))
        }));
        let client = client_with_transport(transport.clone());

        let err = client.get("").await.unwrap_err();
        assert!(matches!(err, ManagementError::InvalidArgument(_)));
        let err = client.delete("not a url").await.unwrap_err();
        assert!(matches!(err, ManagementError::InvalidArgument(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_view_aborts_before_sending() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(Response::from_bytes(StatusCode::OK, ""))
        }));
        let client = client_with_transport(transport.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .with_cancellation(token)
            .put("https://management.azure.com/subscriptions/sub1", "{}")
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Cancelled));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn usable_through_trait_object() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(Response::from_bytes(StatusCode::OK, "payload"))
        }));
        let client = client_with_transport(transport.clone());
        let api: &dyn ManagementApi = &client;

        let body = api
            .put_with_response(
                "https://management.azure.com/subscriptions/sub1",
                Bytes::from_static(b"{}"),
            )
            .await
            .expect("should succeed");
        assert_eq!(&body[..], b"payload");
        api.delete("https://management.azure.com/subscriptions/sub1")
            .await
            .expect("should succeed");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_have_independent_budgets() {
        let transport = Arc::new(FakeTransport::new(|_| Err("connection refused".into())));
        let client = ManagementClient::builder()
            .subscription_id("sub1")
            .application_secret("secret1")
            .transport(transport.clone())
            .retry_policy(RetryPolicy::immediate(2))
            .build()
            .expect("should build");

        let url = "https://management.azure.com/subscriptions/sub1";
        let (a, b) = tokio::join!(client.get(url), client.get(url));

        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(transport.calls(), 6, "each call gets 1 + 2 attempts");
    }
}
