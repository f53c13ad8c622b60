use reqwest::{Client, Response};
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

mod base_path;

pub use base_path::{discover_base_path, find_base_href, resolve_base_path};
pub use version_check_models::*;

#[derive(Error, Debug)]
pub enum VersionCheckError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Cannot dismiss {0} warnings")]
    InvalidOperation(WarningType),
}

impl VersionCheckError {
    /// True for failures of the network round trip itself, as opposed to
    /// requests that were refused before being sent.
    pub fn is_transport(&self) -> bool {
        matches!(self, VersionCheckError::Http(_) | VersionCheckError::Api { .. })
    }
}

/// The two calls the widget makes against the version check UI API.
pub trait StatusApi: Send + Sync + 'static {
    fn fetch_status(
        &self,
    ) -> impl Future<Output = Result<StatusResponse, VersionCheckError>> + Send;

    fn dismiss(
        &self,
        warning: DismissibleWarning,
    ) -> impl Future<Output = Result<DismissResult, VersionCheckError>> + Send;
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    client: Client,
    origin: String,
    base_path: String,
}

impl StatusClient {
    pub fn new<S: Into<String>>(origin: S) -> Self {
        Self {
            client: Client::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
            base_path: String::new(),
        }
    }

    /// Builds a client rooted at the base path the host document declares.
    pub fn from_document<S: Into<String>>(
        origin: S,
        document: &str,
    ) -> Result<Self, VersionCheckError> {
        let client = Self::new(origin);
        let base_path = discover_base_path(&client.origin, document)?;
        Ok(client.with_base_path(base_path))
    }

    pub fn with_base_path<S: AsRef<str>>(mut self, base_path: S) -> Self {
        let trimmed = base_path.as_ref().trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Loads the host page at the origin and roots the client at the base
    /// path that page declares.
    pub async fn with_discovered_base_path(self) -> Result<Self, VersionCheckError> {
        let response = self
            .client
            .get(format!("{}/", self.origin))
            .send()
            .await?
            .error_for_status()?;
        let document = response.text().await?;
        let base_path = discover_base_path(&self.origin, &document)?;
        Ok(self.with_base_path(base_path))
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> String {
        format!("{}{}{}", self.origin, self.base_path, UI_API_PREFIX)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    async fn handle_response<T>(&self, response: Response) -> Result<T, VersionCheckError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
            Ok(error_response) => error_response.detail,
            Err(_) => error_text,
        };
        Err(VersionCheckError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn fetch_status(&self) -> Result<StatusResponse, VersionCheckError> {
        let url = self.endpoint(STATUS_PATH);
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    pub async fn dismiss(
        &self,
        warning: DismissibleWarning,
    ) -> Result<DismissResult, VersionCheckError> {
        let url = self.endpoint(warning.path());
        log::debug!("POST {url}");
        let response = self.client.post(url).send().await?;
        self.handle_response(response).await
    }
}

impl StatusApi for StatusClient {
    fn fetch_status(
        &self,
    ) -> impl Future<Output = Result<StatusResponse, VersionCheckError>> + Send {
        StatusClient::fetch_status(self)
    }

    fn dismiss(
        &self,
        warning: DismissibleWarning,
    ) -> impl Future<Output = Result<DismissResult, VersionCheckError>> + Send {
        StatusClient::dismiss(self, warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    // Answers a single request with the given status line and JSON body and
    // hands back the request line it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

        (origin, handle)
    }

    #[test]
    fn base_url_includes_base_path_and_prefix() {
        let client = StatusClient::new("https://host.example/").with_base_path("/airflow/");
        assert_eq!(
            client.base_url(),
            "https://host.example/airflow/version_check/ui"
        );

        let root = StatusClient::new("https://host.example").with_base_path("/");
        assert_eq!(root.base_url(), "https://host.example/version_check/ui");
    }

    #[test]
    fn from_document_uses_declared_base() {
        let client = StatusClient::from_document(
            "http://localhost:8080",
            "<html><head><base href=\"/deploy/\"></head></html>",
        )
        .unwrap();
        assert_eq!(
            client.base_url(),
            "http://localhost:8080/deploy/version_check/ui"
        );
    }

    #[tokio::test]
    async fn discovers_base_path_from_host_page() {
        let (origin, server) = serve_once(
            "200 OK",
            r#"<!doctype html><html><head><base href="/airflow/"></head><body></body></html>"#,
        )
        .await;

        let client = StatusClient::new(origin.clone())
            .with_discovered_base_path()
            .await
            .unwrap();

        assert_eq!(server.await.unwrap(), "GET / HTTP/1.1");
        assert_eq!(
            client.base_url(),
            format!("{origin}/airflow/version_check/ui")
        );
    }

    #[tokio::test]
    async fn fetch_status_reads_response() {
        let (origin, server) = serve_once(
            "200 OK",
            r#"{"status":{"current_version":"3.0-1","warning":{"type":"eom","level":"warning","message":"Maintenance ends","days_remaining":5,"dismissed_until":null,"can_dismiss":true}},"eom_dismissal_period_days":30,"eobs_dismissal_period_days":14}"#,
        )
        .await;

        let client = StatusClient::new(origin).with_base_path("/airflow");
        let status = client.fetch_status().await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            "GET /airflow/version_check/ui/status HTTP/1.1"
        );
        let warning = status.warning().unwrap();
        assert_eq!(warning.warning_type, WarningType::Eom);
        assert_eq!(warning.days_remaining, Some(5));
        assert_eq!(status.eom_dismissal_period_days, 30);
    }

    #[tokio::test]
    async fn dismiss_posts_to_typed_path() {
        let (origin, server) = serve_once(
            "200 OK",
            r#"{"success":true,"dismissed_until":"2025-03-01","message":"Dismissed"}"#,
        )
        .await;

        let client = StatusClient::new(origin);
        let result = client.dismiss(DismissibleWarning::Eobs).await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            "POST /version_check/ui/dismiss/eobs HTTP/1.1"
        );
        assert!(result.success);
        assert_eq!(result.message, "Dismissed");
        assert!(result.dismissed_until.is_some());
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let (origin, server) =
            serve_once("503 Service Unavailable", r#"{"detail":"database unavailable"}"#).await;

        let client = StatusClient::new(origin);
        let err = tokio_test::assert_err!(client.fetch_status().await);
        server.await.unwrap();

        assert!(err.is_transport());
        match err {
            VersionCheckError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_transport_error() {
        let (origin, server) = serve_once("200 OK", "<html>login</html>").await;

        let client = StatusClient::new(origin);
        let err = client.fetch_status().await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, VersionCheckError::Http(_)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = StatusClient::new(origin).fetch_status().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn invalid_operation_is_not_transport() {
        let err = VersionCheckError::InvalidOperation(WarningType::Yanked);
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "Cannot dismiss yanked warnings");
    }
}
