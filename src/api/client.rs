//! reqwest implementation of the backend API

use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiError, LibraryApi};
use crate::config::ApiConfig;
use crate::models::{
    Abonne, AbonnePayload, Document, DocumentPayload, DocumentQuery, Emprunt, EmpruntPayload,
    Stats,
};

/// `{"id": "..."}` returned by creation endpoints
#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// `{"error": "..."}` returned by the backend on failure
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the media library backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments; segments are percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_status(&method, &url, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.request::<()>(Method::GET, url.clone(), None).await?;
        decode(&url, response).await
    }

    async fn post_created<B>(&self, url: Url, body: &B) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self.request(Method::POST, url.clone(), Some(body)).await?;
        let created: CreatedResponse = decode(&url, response).await?;
        Ok(created.id)
    }

    /// Send a request whose response body is only an acknowledgement
    async fn send_ack<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.request(method, url, body).await?;
        Ok(())
    }
}

/// Turn non-2xx responses into `ApiError::Status`, keeping the backend message
async fn check_status(method: &Method, url: &Url, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body.trim().to_string()
            }
        });

    warn!("{} {} failed with status {}: {}", method, url, status.as_u16(), message);
    Err(ApiError::Status {
        status_code: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: url.path().to_string(),
        source,
    })
}

#[async_trait]
impl LibraryApi for ApiClient {
    async fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>, ApiError> {
        let mut url = self.endpoint(&["documents"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(doc_type) = &query.doc_type {
                pairs.append_pair("type", doc_type.as_str());
            }
            if let Some(disponible) = query.disponible {
                pairs.append_pair("disponible", if disponible { "true" } else { "false" });
            }
        }
        if query.is_empty() {
            url.set_query(None);
        }
        self.get_json(url).await
    }

    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        self.get_json(self.endpoint(&["documents", id])?).await
    }

    async fn create_document(&self, payload: &DocumentPayload) -> Result<String, ApiError> {
        self.post_created(self.endpoint(&["documents"])?, payload).await
    }

    async fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<(), ApiError> {
        self.send_ack(Method::PUT, self.endpoint(&["documents", id])?, Some(payload))
            .await
    }

    async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        self.send_ack::<()>(Method::DELETE, self.endpoint(&["documents", id])?, None)
            .await
    }

    async fn list_abonnes(&self) -> Result<Vec<Abonne>, ApiError> {
        self.get_json(self.endpoint(&["abonnes"])?).await
    }

    async fn get_abonne(&self, id: &str) -> Result<Abonne, ApiError> {
        self.get_json(self.endpoint(&["abonnes", id])?).await
    }

    async fn create_abonne(&self, payload: &AbonnePayload) -> Result<String, ApiError> {
        self.post_created(self.endpoint(&["abonnes"])?, payload).await
    }

    async fn update_abonne(&self, id: &str, payload: &AbonnePayload) -> Result<(), ApiError> {
        self.send_ack(Method::PUT, self.endpoint(&["abonnes", id])?, Some(payload))
            .await
    }

    async fn delete_abonne(&self, id: &str) -> Result<(), ApiError> {
        self.send_ack::<()>(Method::DELETE, self.endpoint(&["abonnes", id])?, None)
            .await
    }

    async fn list_abonne_emprunts(&self, abonne_id: &str) -> Result<Vec<Emprunt>, ApiError> {
        self.get_json(self.endpoint(&["emprunts", "abonne", abonne_id])?)
            .await
    }

    async fn list_emprunts(&self) -> Result<Vec<Emprunt>, ApiError> {
        self.get_json(self.endpoint(&["emprunts"])?).await
    }

    async fn list_overdue_emprunts(&self) -> Result<Vec<Emprunt>, ApiError> {
        self.get_json(self.endpoint(&["emprunts", "en-retard"])?).await
    }

    async fn create_emprunt(&self, payload: &EmpruntPayload) -> Result<String, ApiError> {
        self.post_created(self.endpoint(&["emprunts"])?, payload).await
    }

    async fn return_emprunt(&self, id: &str) -> Result<(), ApiError> {
        self.send_ack::<()>(Method::POST, self.endpoint(&["emprunts", id, "retour"])?, None)
            .await
    }

    async fn delete_emprunt(&self, id: &str) -> Result<(), ApiError> {
        self.send_ack::<()>(Method::DELETE, self.endpoint(&["emprunts", id])?, None)
            .await
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        self.get_json(self.endpoint(&["stats"])?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}/api", addr), handle)
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let api = client("http://localhost:5000/api");
        assert_eq!(
            api.endpoint(&["emprunts", "abc123", "retour"]).unwrap().as_str(),
            "http://localhost:5000/api/emprunts/abc123/retour"
        );

        let api = client("http://localhost:5000/api/");
        assert_eq!(
            api.endpoint(&["stats"]).unwrap().as_str(),
            "http://localhost:5000/api/stats"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let api = client("http://localhost:5000/api");
        assert_eq!(
            api.endpoint(&["documents", "a/b c"]).unwrap().as_str(),
            "http://localhost:5000/api/documents/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = ApiClient::new(&ApiConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_request_times_out_after_configured_delay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        });

        let client = ApiClient::new(&ApiConfig {
            base_url: format!("http://{}/api", addr),
            timeout_seconds: 1,
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url().as_str(), format!("http://{}/api", addr));

        let err = client.stats().await.unwrap_err();
        assert!(matches!(&err, ApiError::Http(e) if e.is_timeout()), "{:?}", err);
    }

    #[tokio::test]
    async fn test_stats_request() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"totalDocuments":3,"totalAbonnes":2,"empruntsEnCours":1,"empruntsEnRetard":0}"#,
        )
        .await;
        let stats = client(&base).stats().await.unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_abonnes, 2);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/stats HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_document_filter_query_parameters() {
        let (base, server) = serve_once("200 OK", "[]").await;
        let query = DocumentQuery {
            doc_type: Some(DocumentType::Book),
            disponible: Some(true),
        };
        let documents = client(&base).list_documents(&query).await.unwrap();
        assert!(documents.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/documents?type=livre&disponible=true "));
    }

    #[tokio::test]
    async fn test_backend_error_message_is_kept() {
        let (base, _server) = serve_once("400 BAD REQUEST", r#"{"error": "Document non disponible"}"#).await;
        let payload = EmpruntPayload {
            abonne_id: "a1".to_string(),
            document_id: "d1".to_string(),
        };
        let err = client(&base).create_emprunt(&payload).await.unwrap_err();
        match err {
            ApiError::Status { status_code, message } => {
                assert_eq!(status_code, 400);
                assert_eq!(message, "Document non disponible");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_created_id_is_returned() {
        let (base, server) = serve_once("201 CREATED", r#"{"message": "ok", "id": "66f1"}"#).await;
        let payload = AbonnePayload {
            nom: "Dupont".to_string(),
            prenom: "Jean".to_string(),
            email: "jean@dupont.fr".to_string(),
            telephone: String::new(),
            adresse: String::new(),
        };
        let id = client(&base).create_abonne(&payload).await.unwrap();
        assert_eq!(id, "66f1");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/abonnes HTTP/1.1"));
    }
}
