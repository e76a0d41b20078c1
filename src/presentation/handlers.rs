// HTTP request handlers
use crate::application::connection_controller::ControllerError;
use crate::application::transport::TransportError;
use crate::domain::connection::ConnectionStatus;
use crate::infrastructure::chunked_json::ndjson_stream;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::IntervalStream;

#[derive(Deserialize)]
pub struct CommandRequest {
    pub cmds: Vec<String>,
}

/// Error body returned for rejected controller operations
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<ControllerError> for ApiError {
    fn from(e: ControllerError) -> Self {
        match e {
            ControllerError::AlreadyActive(_) | ControllerError::Cancelled => Self {
                status: StatusCode::CONFLICT,
                message: e.to_string(),
            },
            ControllerError::Transport(e) => e.into(),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        let status = match e {
            TransportError::NotConnected => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

async fn respond<T: Serialize>(data: &T, headers: &HeaderMap) -> Response {
    match json_response(data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Both aggregate views
pub async fn get_telemetry(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.controller.store().snapshot().await;
    respond(&snapshot, &headers).await
}

pub async fn get_throughput(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.controller.store().snapshot().await;
    respond(&snapshot.throughput, &headers).await
}

pub async fn get_spectrum(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.controller.store().snapshot().await;
    respond(&snapshot.spectrum, &headers).await
}

/// Stream a snapshot every `stream_interval` until the client goes away
pub async fn stream_telemetry(State(state): State<Arc<AppState>>) -> Response {
    let controller = state.controller.clone();
    let ticks = IntervalStream::new(tokio::time::interval(state.stream_interval));
    let snapshots = ticks.then(move |_| {
        let controller = controller.clone();
        async move { controller.store().snapshot().await }
    });

    match ndjson_stream(snapshots) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub async fn clear_telemetry(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.reset_aggregates().await;
    StatusCode::NO_CONTENT
}

pub async fn connection_status(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    respond(&state.controller.status(), &headers).await
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectionStatus>, ApiError> {
    let status = state.controller.connect().await?;
    Ok(Json(status))
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    Json(state.controller.disconnect().await)
}

/// Forward AT command lines to the connected device
pub async fn send_commands(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<StatusCode, ApiError> {
    state.controller.send_commands(&request.cmds).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregate_store::AggregateStore;
    use crate::application::connection_controller::ConnectionController;
    use crate::domain::aggregate::AggregateLimits;
    use crate::domain::connection::ConnectionState;
    use crate::infrastructure::config::{TransportMode, TransportSettings};
    use crate::infrastructure::transport_selector::ConfiguredSelector;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn state_for(tcp_address: String) -> Arc<AppState> {
        let settings = TransportSettings {
            mode: TransportMode::Tcp,
            tcp_address: Some(tcp_address),
            ..TransportSettings::default()
        };
        let controller = ConnectionController::new(
            Arc::new(ConfiguredSelector::new(settings)),
            AggregateStore::new(AggregateLimits::default()),
            false,
        );
        Arc::new(AppState {
            controller: Arc::new(controller),
            stream_interval: Duration::from_millis(10),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_endpoints() {
        let state = state_for("127.0.0.1:1".to_string());
        state
            .controller
            .store()
            .update(|agg| {
                agg.apply_throughput(42.5);
                agg.apply_spectrum(
                    crate::domain::telemetry::FrequencyKey::from_mhz(868.1),
                    -90.0,
                );
            })
            .await;

        let json = body_json(get_telemetry(HeaderMap::new(), State(state.clone())).await).await;
        assert_eq!(json["throughput"][0]["sequence"], 1);
        assert_eq!(json["throughput"][0]["mbps"], 42.5);
        assert_eq!(json["spectrum"][0]["frequency_mhz"], 868.1);
        assert!(json["updated_at_ms"].is_i64());

        let json = body_json(get_spectrum(HeaderMap::new(), State(state.clone())).await).await;
        assert_eq!(json[0]["power"], -90.0);

        assert_eq!(clear_telemetry(State(state.clone())).await, StatusCode::NO_CONTENT);
        let json = body_json(get_throughput(HeaderMap::new(), State(state)).await).await;
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_connect_failure_is_bad_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let state = state_for(address);
        let response = connect(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(state.controller.status().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let state = state_for(listener.local_addr().unwrap().to_string());

        let request = || CommandRequest {
            cmds: vec!["AT+CSQ".to_string()],
        };
        let response = send_commands(State(state.clone()), Json(request()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bridge = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"{\"mbps\":7}\n").await.unwrap();
            socket
        });

        let response = connect(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let _socket = bridge.await.unwrap();

        let response = connect(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send_commands(State(state.clone()), Json(request()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let Json(status) = disconnect(State(state.clone())).await;
        assert_eq!(status.state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stream_emits_snapshot_lines() {
        let state = state_for("127.0.0.1:1".to_string());
        state.controller.store().update(|agg| agg.apply_throughput(1.0)).await;

        let response = stream_telemetry(State(state)).await;
        let mut body = response.into_body().into_data_stream();

        let first = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(first.ends_with(b"\n"));

        let json: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(json["throughput"][0]["mbps"], 1.0);
    }
}
