//! Set-update client
//!
//! The server is the system of record for sets. It exposes
//! `POST /workouts/set/{id}/update`, which replaces the set's mutable
//! fields with the JSON body, and `POST /workouts/set/{id}/delete`.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::UpdateError;
use crate::models::{SetId, UpdateAck, UpdatePayload};

/// Something that can persist set edits
///
/// `update_set` must be an idempotent full replace: sending the same
/// payload twice leaves the set as sending it once would.
pub trait SetUpdater: Send + Sync {
    fn update_set<'a>(
        &'a self,
        id: &'a SetId,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<UpdateAck, UpdateError>>;

    fn delete_set<'a>(&'a self, id: &'a SetId) -> BoxFuture<'a, Result<(), UpdateError>>;
}

/// HTTP client for the set-update endpoint
#[derive(Debug, Clone)]
pub struct HttpSetClient {
    base_url: String,
    base: Url,
    http: reqwest::Client,
}

impl HttpSetClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpdateError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| UpdateError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(UpdateError::InvalidUrl(base_url));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            base,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL for one set; the id is always exactly one path segment
    fn set_url(&self, id: &SetId, action: &str) -> Result<Url, UpdateError> {
        if matches!(id.as_str(), "" | "." | "..") {
            return Err(UpdateError::InvalidId(id.clone()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| UpdateError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["workouts", "set", id.as_str(), action]);
        Ok(url)
    }

    async fn post_update(
        &self,
        id: &SetId,
        payload: &UpdatePayload,
    ) -> Result<UpdateAck, UpdateError> {
        let url = self.set_url(id, "update")?;
        debug!("POST {}", url);

        let response = self.http.post(url).json(payload).send().await?;
        let response = check_status(id, response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UpdateError::Decode(e.to_string()))
    }

    async fn post_delete(&self, id: &SetId) -> Result<(), UpdateError> {
        let url = self.set_url(id, "delete")?;
        debug!("POST {}", url);

        let response = self.http.post(url).send().await?;
        check_status(id, response).await?;
        Ok(())
    }
}

impl SetUpdater for HttpSetClient {
    fn update_set<'a>(
        &'a self,
        id: &'a SetId,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<UpdateAck, UpdateError>> {
        self.post_update(id, payload).boxed()
    }

    fn delete_set<'a>(&'a self, id: &'a SetId) -> BoxFuture<'a, Result<(), UpdateError>> {
        self.post_delete(id).boxed()
    }
}

/// Map non-success statuses to typed errors
async fn check_status(
    id: &SetId,
    response: reqwest::Response,
) -> Result<reqwest::Response, UpdateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => UpdateError::Unauthorized(body),
        StatusCode::FORBIDDEN => UpdateError::Forbidden(body),
        StatusCode::NOT_FOUND => UpdateError::NotFound(id.clone()),
        _ => UpdateError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn payload() -> UpdatePayload {
        UpdatePayload {
            weight: Some(105.0),
            reps: Some(5),
            is_completed: false,
            rpe: None,
            notes: None,
        }
    }

    fn client(server: &MockServer) -> HttpSetClient {
        HttpSetClient::new(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_update_posts_json_body() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workouts/set/12/update")
                    .json_body(json!({
                        "weight": 105.0,
                        "reps": 5,
                        "is_completed": false,
                        "rpe": null,
                        "notes": null
                    }));
                then.status(200)
                    .json_body(json!({"message": "Set updated", "set_id": 12}));
            })
            .await;

        let ack = client(&server)
            .update_set(&SetId::from(12i64), &payload())
            .await
            .unwrap();

        assert_eq!(ack.message, "Set updated");
        assert_eq!(ack.set_id, Some(json!(12)));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_maps_status_codes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/1/update");
                then.status(401).body("Unauthorized");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/2/update");
                then.status(403).body("Access denied");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/3/update");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/4/update");
                then.status(500).body("boom");
            })
            .await;

        let client = client(&server);
        let p = payload();

        let err = client.update_set(&SetId::from(1i64), &p).await.unwrap_err();
        assert!(matches!(err, UpdateError::Unauthorized(ref b) if b == "Unauthorized"));

        let err = client.update_set(&SetId::from(2i64), &p).await.unwrap_err();
        assert!(matches!(err, UpdateError::Forbidden(ref b) if b == "Access denied"));

        let err = client.update_set(&SetId::from(3i64), &p).await.unwrap_err();
        assert!(matches!(err, UpdateError::NotFound(ref id) if id.as_str() == "3"));

        let err = client.update_set(&SetId::from(4i64), &p).await.unwrap_err();
        assert!(matches!(err, UpdateError::Status { status: 500, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_update_rejects_non_json_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/5/update");
                then.status(200).body("<html>login</html>");
            })
            .await;

        let err = client(&server)
            .update_set(&SetId::from(5i64), &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Decode(_)));
    }

    #[tokio::test]
    async fn test_delete_set() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/9/delete");
                then.status(200)
                    .json_body(json!({"message": "Set deleted", "set_id": 9}));
            })
            .await;

        client(&server).delete_set(&SetId::from(9i64)).await.unwrap();
        m.assert_async().await;
    }

    #[test]
    fn test_set_url_encodes_id_as_one_segment() {
        let client =
            HttpSetClient::new("http://localhost:5000/app/", Duration::from_secs(1)).unwrap();

        let url = client.set_url(&SetId::from(12i64), "update").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/app/workouts/set/12/update");

        let url = client.set_url(&SetId::new("1/../2"), "update").unwrap();
        assert_eq!(url.path(), "/app/workouts/set/1%2F..%2F2/update");

        let url = client.set_url(&SetId::new("3?x=1#top"), "delete").unwrap();
        assert_eq!(url.path(), "/app/workouts/set/3%3Fx=1%23top/delete");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_dot_ids_are_rejected() {
        let client = HttpSetClient::new("http://localhost:5000", Duration::from_secs(1)).unwrap();
        for raw in ["", ".", ".."] {
            let err = client.set_url(&SetId::new(raw), "update").unwrap_err();
            assert!(matches!(err, UpdateError::InvalidId(_)));
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpSetClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, UpdateError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_path_like_id_cannot_reach_another_set() {
        let server = MockServer::start_async().await;
        let other = server
            .mock_async(|when, then| {
                when.method(POST).path("/workouts/set/2/update");
                then.status(200)
                    .json_body(json!({"message": "Set updated", "set_id": 2}));
            })
            .await;

        let result = client(&server)
            .update_set(&SetId::new("1/../2"), &payload())
            .await;

        assert!(result.is_err());
        assert_eq!(other.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Nothing listens on port 9 of localhost
        let client = HttpSetClient::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");

        let err = client
            .update_set(&SetId::from(1i64), &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Transport(_)));
        assert!(err.is_transient());
    }
}
