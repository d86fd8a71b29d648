use crate::model::IncidentRecord;
use crate::prelude::{TransportError, TransportResult};
use crate::reconcile::IncidentFilters;
use log::{debug, warn};
use reqwest::{Client, Url};
use std::future::Future;

/// Backend page size cap for `/events`.
pub const MAX_SNAPSHOT_LIMIT: usize = 200;

/// Point-in-time source of incident records, most recent first.
///
/// A failed load is an error, never a shorter list. Retrying is up to the caller.
pub trait SnapshotSource {
    fn load(
        &self,
        filters: &IncidentFilters,
    ) -> impl Future<Output = TransportResult<Vec<IncidentRecord>>>;
}

/// Loads `/events` from the REST backend.
#[derive(Debug, Clone)]
pub struct HttpSnapshotLoader {
    client: Client,
    endpoint: Url,
    credential: Option<String>,
    limit: usize,
}

impl HttpSnapshotLoader {
    pub fn new(api_base: &str, credential: Option<String>, limit: usize) -> TransportResult<Self> {
        let endpoint = api_endpoint(api_base, "events")?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            credential,
            limit: limit.clamp(1, MAX_SNAPSHOT_LIMIT),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl SnapshotSource for HttpSnapshotLoader {
    async fn load(&self, filters: &IncidentFilters) -> TransportResult<Vec<IncidentRecord>> {
        let mut query = filters.to_query();
        query.push(("limit", self.limit.to_string()));

        let mut request = self.client.get(self.endpoint.clone()).query(&query);
        if let Some(token) = &self.credential {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("snapshot load rejected with {}", status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let records = decode_snapshot(&body)?;
        debug!("snapshot load returned {} records", records.len());
        Ok(records)
    }
}

/// Decodes the whole body or fails; one bad row rejects the snapshot.
pub fn decode_snapshot(body: &[u8]) -> TransportResult<Vec<IncidentRecord>> {
    serde_json::from_slice(body).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Joins `path` onto the API base, tolerating a base without a trailing slash.
pub(crate) fn api_endpoint(api_base: &str, path: &str) -> TransportResult<Url> {
    let mut base = api_base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .and_then(|url| url.join(path))
        .map_err(|err| TransportError::InvalidEndpoint(format!("{api_base}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;

    #[test]
    fn endpoint_keeps_base_path() {
        let url = api_endpoint("http://localhost:8000/api", "events").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/events");
        let url = api_endpoint("http://localhost:8000", "events").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/events");
    }

    #[test]
    fn invalid_base_is_reported() {
        assert!(matches!(
            HttpSnapshotLoader::new("not a url", None, 50),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn limit_is_capped_at_backend_maximum() {
        let loader = HttpSnapshotLoader::new("http://localhost:8000", None, 5000).unwrap();
        assert_eq!(loader.limit(), MAX_SNAPSHOT_LIMIT);
    }

    #[test]
    fn decodes_ordered_rows() {
        let body = br#"[
            {"id": 2, "camera_id": 1, "ts": "2024-05-01T08:01:00Z", "confidence": 0.5, "severity": "medium", "ack": false},
            {"id": 1, "camera_id": null, "ts": "2024-05-01T08:00:00", "confidence": 0.9, "severity": "critical", "ack": true, "ack_by": "alice"}
        ]"#;
        let records = decode_snapshot(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, RecordId::Int(2));
        assert!(records[1].acknowledged);
    }

    #[test]
    fn one_bad_row_fails_the_whole_snapshot() {
        let body = br#"[{"id": 1, "ts": "2024-05-01T08:00:00Z"}, {"id": 2, "ts": "soon"}]"#;
        assert!(matches!(decode_snapshot(body), Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let loader = HttpSnapshotLoader::new("http://127.0.0.1:1", None, 20).unwrap();
        let result = loader.load(&IncidentFilters::default()).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
