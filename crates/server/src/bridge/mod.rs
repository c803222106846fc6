//! One WebSocket session per open meeting page. The session owns a
//! [`MeetingController`] whose widget seams are backed by the page relay,
//! so the page stays a dumb executor of commands.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use meeting_core::{view, ControllerConfig, MeetingController, MeetingEvent};
use shared::{domain::MeetingParameters, error::ApiError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod protocol;
mod widget;

use protocol::{BridgeCommand, BridgeEvent};
use widget::PageBridge;

use crate::{app_state::AppState, meeting_parameters, pages::MOUNT_ELEMENT_ID, MeetingQuery};

pub(crate) async fn bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Query(query): Query<MeetingQuery>,
) -> Response {
    match meeting_parameters(&state.settings, &room, &query) {
        Ok(params) => ws.on_upgrade(move |socket| bridge_session(state, socket, params)),
        Err(err) => (StatusCode::BAD_REQUEST, Json(ApiError::from(err))).into_response(),
    }
}

async fn bridge_session(state: Arc<AppState>, socket: WebSocket, params: MeetingParameters) {
    let session = Uuid::new_v4();
    info!(%session, room = %params.room, "bridge: session opened");

    let (mut sender, mut receiver) = socket.split();
    let (commands, mut commands_rx) = mpsc::channel::<BridgeCommand>(64);

    let send_task = tokio::spawn(async move {
        while let Some(command) = commands_rx.recv().await {
            let text = match serde_json::to_string(&command) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let bridge = PageBridge::new(params.domain.clone(), commands.clone());
    let controller = MeetingController::new_with_config(
        bridge.clone(),
        ControllerConfig {
            mount_element_id: MOUNT_ELEMENT_ID.to_string(),
            app_name: Some(state.settings.app_name.clone()),
            ..ControllerConfig::default()
        },
    );

    // Subscribe before start so the page sees the connecting status too.
    let mut meeting_events = controller.subscribe_events();
    let status_commands = commands.clone();
    let status_task = tokio::spawn(async move {
        while let Ok(event) = meeting_events.recv().await {
            if let MeetingEvent::StateChanged(next) = event {
                let line = view::status_line(next).map(str::to_string);
                let command = BridgeCommand::ShowStatus { state: next, line };
                if status_commands.send(command).await.is_err() {
                    break;
                }
            }
        }
    });

    let start_controller = Arc::clone(&controller);
    let start_params = params.clone();
    tokio::spawn(async move {
        if let Err(err) = start_controller.start(start_params).await {
            warn!(%session, "bridge: start failed: {err}");
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str::<BridgeEvent>(&text) {
            Ok(event) => bridge.handle_event(event).await,
            Err(err) => debug!(%session, "bridge: ignoring malformed event: {err}"),
        }
    }

    controller.stop().await;
    status_task.abort();
    send_task.abort();
    let attempts = controller.reconnect_attempts().await;
    info!(%session, attempts, "bridge: session closed");
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
