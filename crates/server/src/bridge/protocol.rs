//! Wire protocol between the server-side controller session and the page
//! relay script. The page owns the real embedding API object; every
//! decision stays on this side of the socket.

use jitsi_integration::{JitsiWidgetEvent, JitsiWidgetOptions};
use meeting_core::ConnectionState;
use serde::{Deserialize, Serialize};

/// Server -> page instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub(crate) enum BridgeCommand {
    LoadScript {
        script_url: String,
    },
    CreateWidget {
        domain: String,
        options: JitsiWidgetOptions,
    },
    DisposeWidget,
    QueryParticipants {
        probe_id: u64,
    },
    ShowStatus {
        state: ConnectionState,
        line: Option<String>,
    },
}

/// Page -> server replies and forwarded widget events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub(crate) enum BridgeEvent {
    ScriptReady,
    ScriptFailed { reason: String },
    WidgetCreated,
    WidgetFailed { reason: String },
    Widget(JitsiWidgetEvent),
    ParticipantCount { probe_id: u64, count: usize },
    ProbeFailed { probe_id: u64, reason: String },
}
