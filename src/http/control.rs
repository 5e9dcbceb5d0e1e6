use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::discovery::{parse_wait, scanner::DeviceDescriptor, DeviceRecord};
use crate::http::error::ApiError;
use crate::http::state::ControlState;
use crate::http::{present, required};
use crate::session::{ConnectRequest, LoadRequest, SessionState};

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

#[derive(Debug, Deserialize)]
pub struct DevicesParams {
    pub interface: Option<String>,
    pub wait: Option<String>,
}

/// GET /devices: scan and return every receiver seen within the window.
pub async fn devices(
    State(state): State<ControlState>,
    Query(params): Query<DevicesParams>,
) -> Result<Json<Vec<DeviceDescriptor>>, ApiError> {
    let interface = present(params.interface);
    let wait = parse_wait(params.wait.as_deref(), state.default_wait);
    let devices = state
        .sessions
        .list_devices(interface.as_deref(), wait)
        .await?;
    Ok(Json(devices.iter().map(DeviceRecord::descriptor).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub uuid: Option<String>,
    pub addr: Option<String>,
    pub port: Option<String>,
    pub interface: Option<String>,
    pub wait: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub uuid: String,
    pub connected: bool,
}

/// /connect: open a control session, discovering the address when not given.
pub async fn connect(
    State(state): State<ControlState>,
    Query(params): Query<ConnectParams>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let uuid = required(params.uuid, "uuid")?;
    let request = ConnectRequest {
        uuid: uuid.clone(),
        addr: present(params.addr),
        port: present(params.port),
        interface: present(params.interface),
        wait: parse_wait(params.wait.as_deref(), state.default_wait),
    };
    state.sessions.connect(request).await?;
    Ok(Json(ConnectResponse {
        uuid,
        connected: true,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DisconnectParams {
    pub uuid: Option<String>,
    pub stop: Option<String>,
}

/// /disconnect: drop the session, optionally stopping playback first.
pub async fn disconnect(
    State(state): State<ControlState>,
    Query(params): Query<DisconnectParams>,
) -> Result<String, ApiError> {
    let uuid = required(params.uuid, "uuid")?;
    let stop = parse_flag(params.stop.as_deref());
    state.sessions.disconnect(&uuid, stop).await?;
    Ok(format!("disconnected from {uuid}\n"))
}

#[derive(Debug, Deserialize)]
pub struct LoadParams {
    pub uuid: Option<String>,
    pub path: Option<String>,
    pub content_type: Option<String>,
}

/// /load: tell a connected device to fetch and play `path`.
pub async fn load(
    State(state): State<ControlState>,
    Query(params): Query<LoadParams>,
) -> Result<StatusCode, ApiError> {
    let uuid = required(params.uuid, "uuid")?;
    let path = required(params.path, "path")?;
    state
        .sessions
        .load(LoadRequest {
            uuid,
            path,
            content_type: present(params.content_type),
        })
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Serialize)]
pub struct ConnectedEntry {
    pub uuid: String,
    pub state: SessionState,
}

/// GET /connected: identities currently tracked by the registry.
pub async fn connected(State(state): State<ControlState>) -> Json<Vec<ConnectedEntry>> {
    Json(
        state
            .sessions
            .connected()
            .into_iter()
            .map(|(uuid, state)| ConnectedEntry { uuid, state })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_spellings() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("YES")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(None));
    }
}
