use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::MeetingParameters;
use tokio::sync::broadcast;

/// URL of the provider's embedding script for a deployment domain.
pub fn external_api_url(domain: &str) -> String {
    format!("https://{domain}/external_api.js")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitsiUserInfo {
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitsiConfigOverwrite {
    pub start_with_audio_muted: bool,
    pub start_with_video_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitsiInterfaceConfigOverwrite {
    #[serde(rename = "APP_NAME")]
    pub app_name: String,
}

/// Constructor options forwarded verbatim to the embedding script, so the
/// field names follow its camelCase convention. `parent_node` carries the
/// mount element id; whoever constructs the widget resolves it to the
/// actual element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitsiWidgetOptions {
    pub room_name: String,
    pub width: String,
    pub height: String,
    pub parent_node: String,
    pub user_info: JitsiUserInfo,
    pub config_overwrite: JitsiConfigOverwrite,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_config_overwrite: Option<JitsiInterfaceConfigOverwrite>,
}

impl JitsiWidgetOptions {
    pub fn from_parameters(
        params: &MeetingParameters,
        mount_id: &str,
        app_name: Option<String>,
    ) -> Self {
        Self {
            room_name: params.room.as_str().to_string(),
            width: "100%".to_string(),
            height: "100%".to_string(),
            parent_node: mount_id.to_string(),
            user_info: JitsiUserInfo {
                display_name: params.display_name.as_str().to_string(),
            },
            config_overwrite: JitsiConfigOverwrite {
                start_with_audio_muted: params.start_muted.audio,
                start_with_video_muted: params.start_muted.video,
            },
            interface_config_overwrite: app_name
                .map(|app_name| JitsiInterfaceConfigOverwrite { app_name }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetFault {
    pub name: String,
    pub message: String,
    pub is_fatal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum JitsiWidgetEvent {
    ConnectionEstablished,
    ConnectionFailed,
    VideoConferenceJoined,
    VideoConferenceLeft,
    ReadyToClose,
    SuspendDetected,
    ErrorOccurred(WidgetFault),
}

#[async_trait]
pub trait JitsiWidget: Send + Sync {
    async fn dispose(&self) -> anyhow::Result<()>;
    /// Harmless liveness query. An error means the widget is gone or its
    /// mount point is no longer attached.
    async fn participant_count(&self) -> anyhow::Result<usize>;
    fn subscribe_events(&self) -> broadcast::Receiver<JitsiWidgetEvent>;
}

#[async_trait]
pub trait JitsiWidgetFactory: Send + Sync {
    async fn create(&self, options: JitsiWidgetOptions) -> anyhow::Result<Arc<dyn JitsiWidget>>;
}

#[async_trait]
pub trait ExternalApiLoader: Send + Sync {
    /// Load the embedding script once; later calls hand back the already
    /// loaded entry point without reloading.
    async fn ensure_loaded(&self) -> anyhow::Result<Arc<dyn JitsiWidgetFactory>>;
}

#[cfg(test)]
mod tests {
    use shared::domain::{DisplayName, RoomName, StartMuted};

    use super::*;

    fn params() -> MeetingParameters {
        MeetingParameters {
            room: RoomName::parse("design-review").expect("room"),
            display_name: DisplayName::parse("Sam Carter").expect("name"),
            domain: "meet.jit.si".to_string(),
            start_muted: StartMuted {
                audio: true,
                video: false,
            },
        }
    }

    #[test]
    fn external_api_url_targets_domain() {
        assert_eq!(
            external_api_url("meet.jit.si"),
            "https://meet.jit.si/external_api.js"
        );
    }

    #[test]
    fn options_serialize_in_embed_script_shape() {
        let options = JitsiWidgetOptions::from_parameters(
            &params(),
            "meeting-root",
            Some("Team Meetings".to_string()),
        );
        let value = serde_json::to_value(&options).expect("serialize");
        assert_eq!(value["roomName"], "design-review");
        assert_eq!(value["parentNode"], "meeting-root");
        assert_eq!(value["userInfo"]["displayName"], "Sam Carter");
        assert_eq!(value["configOverwrite"]["startWithAudioMuted"], true);
        assert_eq!(value["configOverwrite"]["startWithVideoMuted"], false);
        assert_eq!(
            value["interfaceConfigOverwrite"]["APP_NAME"],
            "Team Meetings"
        );
    }

    #[test]
    fn options_omit_interface_overrides_when_absent() {
        let options = JitsiWidgetOptions::from_parameters(&params(), "meeting-root", None);
        let value = serde_json::to_value(&options).expect("serialize");
        assert!(value.get("interfaceConfigOverwrite").is_none());
    }

    #[test]
    fn widget_events_use_tagged_payloads() {
        let plain = serde_json::to_value(&JitsiWidgetEvent::ConnectionEstablished)
            .expect("serialize");
        assert_eq!(plain["type"], "connection_established");

        let fault = serde_json::to_value(&JitsiWidgetEvent::ErrorOccurred(WidgetFault {
            name: "conference.connectionError".to_string(),
            message: "lost signaling".to_string(),
            is_fatal: true,
        }))
        .expect("serialize");
        assert_eq!(fault["type"], "error_occurred");
        assert_eq!(fault["payload"]["is_fatal"], true);
        assert!(fault["payload"].get("isFatal").is_none());
    }
}
