//! HTTP routes.
//!
//! `GET /orbital_position/` answers with a JSON array of positions. When the
//! answer came from the remote source, the cache write is tied to the
//! response body: it starts once the payload has been handed to the
//! transport, or when the body is dropped because the client went away.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use ephem::{EphemError, EphemerisService, PendingWrite, PositionsRequest};

/// Header naming where the positions came from (`cache` or `remote`).
pub const ORIGIN_HEADER: HeaderName = HeaderName::from_static("x-ephem-origin");

const BANNER: &str = "ephem: orbital elements cache for JPL Horizons\n";

/// Build the application router.
pub fn router(service: Arc<EphemerisService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/orbital_position", get(orbital_position))
        .route("/orbital_position/", get(orbital_position))
        .with_state(service)
}

async fn index() -> &'static str {
    BANNER
}

/// Raw query parameters. Missing values are empty and fail validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PositionsQuery {
    orbital_body_id: String,
    center: String,
    start_time: String,
    stop_time: String,
    step: String,
}

async fn orbital_position(
    State(service): State<Arc<EphemerisService>>,
    Query(query): Query<PositionsQuery>,
) -> Result<Response, ApiError> {
    let request = PositionsRequest::parse(
        &query.orbital_body_id,
        &query.center,
        &query.start_time,
        &query.stop_time,
        &query.step,
    )?;

    let outcome = service.get_positions(&request).await?;
    let payload = serde_json::to_vec(&outcome.positions)
        .map_err(|e| ApiError(EphemError::Store(format!("failed to encode positions: {e}"))))?;

    let body = match outcome.pending {
        Some(write) => deferred_body(Bytes::from(payload), write),
        None => Body::from(payload),
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        ORIGIN_HEADER,
        HeaderValue::from_static(outcome.origin.as_str()),
    );
    Ok(response)
}

/// Body that yields `payload` and then starts `write`.
fn deferred_body(payload: Bytes, write: PendingWrite) -> Body {
    let mut guard = DeferredWrite(Some(write));
    let chunks = stream! {
        yield Ok::<Bytes, Infallible>(payload);
        // Polled again only after the chunk has been taken for delivery.
        guard.start();
    };
    Body::from_stream(chunks)
}

/// Starts the wrapped write at most once, at the latest when dropped.
struct DeferredWrite(Option<PendingWrite>);

impl DeferredWrite {
    fn start(&mut self) {
        if let Some(write) = self.0.take() {
            debug!(positions = write.len(), "Starting deferred cache write");
            write.spawn();
        }
    }
}

impl Drop for DeferredWrite {
    fn drop(&mut self) {
        if self.0.is_some() {
            warn!("Response body dropped before delivery; writing cache anyway");
        }
        self.start();
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// [`EphemError`] mapped onto an HTTP status.
#[derive(Debug)]
struct ApiError(EphemError);

impl From<EphemError> for ApiError {
    fn from(error: EphemError) -> Self {
        Self(error)
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_remote_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, %status, "Request failed");
        } else {
            debug!(error = %self.0, "Rejected request");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use ephem::{
        BodyId, Center, ElementsRequest, Ephemeris, EphemerisBounds, EphemerisSource,
        EphemerisStore, InMemoryStore, OrbitalElements, Position, Result, generate,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Debug, Default)]
    struct GridSource {
        fail: bool,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl EphemerisSource for GridSource {
        fn name(&self) -> &str {
            "grid"
        }

        async fn fetch_elements(&self, request: &ElementsRequest) -> Result<Ephemeris> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EphemError::RemoteFetch("connection refused".to_string()));
            }
            let step = request.step;
            let positions = generate(request.start, request.stop, step.interval(), step.skip())
                .map(|time| {
                    Position::new(
                        request.body,
                        request.center.clone(),
                        time,
                        OrbitalElements {
                            semimajor_axis: 1.0,
                            ..Default::default()
                        },
                    )
                })
                .collect();
            Ok(Ephemeris {
                target_name: Some("Earth".to_string()),
                positions,
            })
        }

        async fn probe_bounds(&self, _body: BodyId) -> Result<EphemerisBounds> {
            Ok(EphemerisBounds {
                first: ephem::Body::earliest_representable(),
                last: ephem::Body::latest_representable(),
            })
        }
    }

    fn app(source: Arc<GridSource>) -> (Router, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let service = EphemerisService::new(store.clone(), source);
        (router(Arc::new(service)), store)
    }

    const EARTH_QUERY: &str = "/orbital_position/?orbital_body_id=399&center=500@10\
        &start_time=2020-01-01T00:00:00&stop_time=2020-01-02T00:00:00&step=1d";

    async fn get(router: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let origin = response
            .headers()
            .get(ORIGIN_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, origin, body.to_vec())
    }

    async fn wait_for_rows(store: &InMemoryStore, rows: usize) {
        for _ in 0..100 {
            if store.position_count().await >= rows {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("deferred write did not land");
    }

    #[tokio::test]
    async fn index_banner() {
        let (router, _) = app(Arc::default());
        let (status, _, body) = get(&router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().starts_with("ephem"));
    }

    #[tokio::test]
    async fn miss_is_delivered_then_cached() {
        let source = Arc::new(GridSource::default());
        let (router, store) = app(source.clone());

        let (status, origin, body) = get(&router, EARTH_QUERY).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(origin.as_deref(), Some("remote"));

        let positions: Vec<Position> = serde_json::from_slice(&body).unwrap();
        let times: Vec<DateTime<Utc>> = positions.iter().map(|p| p.time).collect();
        assert_eq!(times.len(), 2);
        assert!(times[0] < times[1]);

        wait_for_rows(&store, 2).await;
        let body = store.get_body(BodyId::new(399)).await.unwrap().unwrap();
        assert_eq!(body.name, "Earth");

        let (status, origin, cached) = get(&router, EARTH_QUERY).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(origin.as_deref(), Some("cache"));
        let cached: Vec<Position> = serde_json::from_slice(&cached).unwrap();
        assert_eq!(cached, positions);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn json_shape() {
        let (router, _) = app(Arc::default());
        let (_, _, body) = get(&router, EARTH_QUERY).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let first = &value[0];
        assert_eq!(first["orbital_body"], 399);
        assert_eq!(first["center"], "500@10");
        assert_eq!(first["semimajor_axis"], 1.0);
        assert!(first.get("time").is_some());
    }

    #[tokio::test]
    async fn dropped_body_still_writes() {
        let source = Arc::new(GridSource::default());
        let (router, store) = app(source);

        let response = router
            .oneshot(Request::get(EARTH_QUERY).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        drop(response);

        wait_for_rows(&store, 2).await;
        let center = Center::new("500@10").unwrap();
        let stored = store
            .get_positions(
                BodyId::new(399),
                &center,
                DateTime::<Utc>::MIN_UTC,
                DateTime::<Utc>::MAX_UTC,
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn malformed_input_is_bad_request() {
        let (router, _) = app(Arc::default());

        let uri = "/orbital_position/?orbital_body_id=399&center=500@10\
            &start_time=2020-01-01&stop_time=2020-01-02&step=1y";
        let (status, _, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["error"].as_str().unwrap().contains("step"));

        let (status, _, _) = get(&router, "/orbital_position/?orbital_body_id=399").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn remote_failure_is_bad_gateway() {
        let source = Arc::new(GridSource {
            fail: true,
            ..Default::default()
        });
        let (router, _) = app(source);
        let (status, origin, _) = get(&router, EARTH_QUERY).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(origin.is_none());
    }

    #[test]
    fn store_errors_are_internal() {
        let error = ApiError(EphemError::Store("disk full".to_string()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = ApiError(EphemError::RemoteFormat("no $$SOE".to_string()));
        assert_eq!(error.status(), StatusCode::BAD_GATEWAY);
    }
}
