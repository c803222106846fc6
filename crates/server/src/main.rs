use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use shared::domain::{DisplayName, MeetingParameters, ParameterError, RoomName, StartMuted};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

mod app_state;
mod bridge;
mod config;
mod pages;

use app_state::AppState;
use config::{load_settings, Settings};

const MAX_FORM_BYTES: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
pub(crate) struct MeetingQuery {
    pub(crate) display_name: Option<String>,
    pub(crate) audio_muted: Option<bool>,
    pub(crate) video_muted: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct JoinForm {
    room: String,
    display_name: String,
    audio_muted: Option<String>,
    video_muted: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let addr: SocketAddr = settings.bind_addr.parse()?;
    if let Some(public_url) = &settings.public_url {
        info!(%public_url, "serving under advertised base url");
    }
    let state = AppState {
        settings: Arc::new(settings),
    };
    let app = build_router(Arc::new(state));

    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(join_form))
        .route("/join", post(join_submit))
        .route("/rooms/:room", get(meeting_room))
        .route("/rooms/:room/bridge", get(bridge::bridge_handler))
        .route("/static/bridge.js", get(bridge_script))
        .route("/static/join.js", get(join_script))
        .route("/static/app.css", get(stylesheet))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}

/// Request-time meeting parameters: the room from the path, the rest from
/// the query string with settings supplying the defaults.
pub(crate) fn meeting_parameters(
    settings: &Settings,
    room: &str,
    query: &MeetingQuery,
) -> Result<MeetingParameters, ParameterError> {
    let room = RoomName::parse(room)?;
    let display_name = DisplayName::parse(query.display_name.as_deref().unwrap_or_default())?;
    Ok(MeetingParameters {
        room,
        display_name,
        domain: settings.jitsi_domain.clone(),
        start_muted: StartMuted {
            audio: query.audio_muted.unwrap_or(settings.start_audio_muted),
            video: query.video_muted.unwrap_or(settings.start_video_muted),
        },
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn join_form(State(state): State<Arc<AppState>>) -> Html<String> {
    let defaults = StartMuted {
        audio: state.settings.start_audio_muted,
        video: state.settings.start_video_muted,
    };
    Html(pages::join_page(&state.settings, None, "", "", defaults))
}

async fn join_submit(State(state): State<Arc<AppState>>, Form(form): Form<JoinForm>) -> Response {
    let start_muted = StartMuted {
        audio: form.audio_muted.is_some(),
        video: form.video_muted.is_some(),
    };
    let validated = RoomName::parse(&form.room)
        .and_then(|room| DisplayName::parse(&form.display_name).map(|name| (room, name)));

    match validated {
        Ok((room, display_name)) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("display_name", display_name.as_str())
                .append_pair("audio_muted", bool_str(start_muted.audio))
                .append_pair("video_muted", bool_str(start_muted.video))
                .finish();
            Redirect::to(&format!("/rooms/{room}?{query}")).into_response()
        }
        Err(err) => {
            let page = pages::join_page(
                &state.settings,
                Some(&err.to_string()),
                &form.room,
                &form.display_name,
                start_muted,
            );
            (StatusCode::BAD_REQUEST, Html(page)).into_response()
        }
    }
}

async fn meeting_room(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Query(query): Query<MeetingQuery>,
) -> Response {
    match meeting_parameters(&state.settings, &room, &query) {
        Ok(params) => Html(pages::meeting_page(&state.settings, &params)).into_response(),
        Err(err) => {
            let start_muted = StartMuted {
                audio: query.audio_muted.unwrap_or(state.settings.start_audio_muted),
                video: query.video_muted.unwrap_or(state.settings.start_video_muted),
            };
            let page = pages::join_page(
                &state.settings,
                Some(&err.to_string()),
                &room,
                query.display_name.as_deref().unwrap_or_default(),
                start_muted,
            );
            (StatusCode::BAD_REQUEST, Html(page)).into_response()
        }
    }
}

async fn bridge_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        include_str!("../static/bridge.js"),
    )
}

async fn join_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        include_str!("../static/join.js"),
    )
}

async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css")],
        include_str!("../static/app.css"),
    )
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
