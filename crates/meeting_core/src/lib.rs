use std::{fmt, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use jitsi_integration::{
    ExternalApiLoader, JitsiWidget, JitsiWidgetEvent, JitsiWidgetFactory, JitsiWidgetOptions,
    WidgetFault,
};
use shared::domain::MeetingParameters;
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub mod state;
pub mod view;

pub use state::ConnectionState;

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MOUNT_ELEMENT_ID: &str = "meeting-root";

fn is_service_disruption(fault: &WidgetFault) -> bool {
    if fault.is_fatal {
        return true;
    }
    let name = fault.name.to_ascii_lowercase();
    if name.starts_with("connection.") || name.contains("connectionerror") {
        return true;
    }
    let message = fault.message.to_ascii_lowercase();
    message.contains("service unavailable") || message.contains("max users")
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub max_reconnect_attempts: u32,
    pub probe_interval: Duration,
    pub mount_element_id: String,
    pub app_name: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            mount_element_id: DEFAULT_MOUNT_ELEMENT_ID.to_string(),
            app_name: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to load embedding script: {0}")]
    ScriptLoad(String),
    #[error("failed to construct widget: {0}")]
    Construction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    ConnectionFailed,
    SuspendDetected,
    ServiceError,
    ProbeFailure,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureCause::ConnectionFailed => "connection_failed",
            FailureCause::SuspendDetected => "suspend_detected",
            FailureCause::ServiceError => "service_error",
            FailureCause::ProbeFailure => "probe_failure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingEvent {
    StateChanged(ConnectionState),
    ReconnectScheduled {
        attempt: u32,
        max: u32,
        cause: FailureCause,
    },
    WidgetFault {
        name: String,
        message: String,
    },
}

pub struct MissingExternalApiLoader;

#[async_trait]
impl ExternalApiLoader for MissingExternalApiLoader {
    async fn ensure_loaded(&self) -> Result<Arc<dyn JitsiWidgetFactory>> {
        Err(anyhow!("external api loader is unavailable"))
    }
}

pub struct MeetingController {
    loader: Arc<dyn ExternalApiLoader>,
    config: ControllerConfig,
    inner: Mutex<ControllerInner>,
    active: Mutex<Option<ActiveWidget>>,
    events: broadcast::Sender<MeetingEvent>,
}

struct ControllerInner {
    params: Option<MeetingParameters>,
    state: ConnectionState,
    reconnect_attempts: u32,
    reconnect_in_flight: bool,
    // Bumped by every start() and stop(); a start sequence only installs
    // its widget if the epoch it was launched under is still current.
    session_epoch: u64,
}

struct ActiveWidget {
    widget: Arc<dyn JitsiWidget>,
    event_task: JoinHandle<()>,
    probe_task: JoinHandle<()>,
}

impl MeetingController {
    pub fn new() -> Arc<Self> {
        Self::new_with_loader(Arc::new(MissingExternalApiLoader))
    }

    pub fn new_with_loader(loader: Arc<dyn ExternalApiLoader>) -> Arc<Self> {
        Self::new_with_config(loader, ControllerConfig::default())
    }

    pub fn new_with_config(
        loader: Arc<dyn ExternalApiLoader>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            loader,
            config,
            inner: Mutex::new(ControllerInner {
                params: None,
                state: ConnectionState::Connecting,
                reconnect_attempts: 0,
                reconnect_in_flight: false,
                session_epoch: 0,
            }),
            active: Mutex::new(None),
            events,
        })
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().await.reconnect_attempts
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MeetingEvent> {
        self.events.subscribe()
    }

    /// Mount (or remount) the widget for `params`. Any previous widget is
    /// disposed first and the reconnect budget starts over.
    pub async fn start(self: &Arc<Self>, params: MeetingParameters) -> Result<(), StartError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.params = Some(params.clone());
            inner.reconnect_attempts = 0;
            inner.reconnect_in_flight = false;
            inner.session_epoch += 1;
            let previous = std::mem::replace(&mut inner.state, ConnectionState::Connecting);
            if previous != ConnectionState::Connecting {
                info!("meeting: state {previous} -> connecting");
            }
            inner.session_epoch
        };
        let _ = self
            .events
            .send(MeetingEvent::StateChanged(ConnectionState::Connecting));
        info!("meeting: start room={} domain={}", params.room, params.domain);

        match self.run_start_sequence(params, epoch).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("meeting: start failed: {err}");
                self.transition_to(ConnectionState::Error).await;
                Err(err)
            }
        }
    }

    /// Tear everything down. Safe to call from any state, and again after
    /// it already ran.
    pub async fn stop(&self) {
        self.release_active().await;
        let previous = {
            let mut inner = self.inner.lock().await;
            inner.reconnect_in_flight = false;
            inner.session_epoch += 1;
            std::mem::replace(&mut inner.state, ConnectionState::Closed)
        };
        if previous != ConnectionState::Closed {
            info!("meeting: state {previous} -> closed");
            let _ = self
                .events
                .send(MeetingEvent::StateChanged(ConnectionState::Closed));
        }
    }

    /// Load the script, construct the widget and wire its observers. The
    /// previous widget is released before anything new is created.
    async fn run_start_sequence(
        self: &Arc<Self>,
        params: MeetingParameters,
        epoch: u64,
    ) -> Result<(), StartError> {
        self.release_active().await;

        let factory = self
            .loader
            .ensure_loaded()
            .await
            .map_err(|err| StartError::ScriptLoad(err.to_string()))?;

        let options = JitsiWidgetOptions::from_parameters(
            &params,
            &self.config.mount_element_id,
            self.config.app_name.clone(),
        );
        let widget = factory
            .create(options)
            .await
            .map_err(|err| StartError::Construction(err.to_string()))?;

        let event_task = self.spawn_widget_event_task(Arc::clone(&widget));
        let probe_task = self.spawn_probe_task(Arc::clone(&widget));

        let (superseded, displaced) = {
            let inner = self.inner.lock().await;
            if inner.session_epoch == epoch {
                let mut active = self.active.lock().await;
                let displaced = active.replace(ActiveWidget {
                    widget: Arc::clone(&widget),
                    event_task,
                    probe_task,
                });
                (None, displaced)
            } else {
                (Some((event_task, probe_task)), None)
            }
        };

        if let Some(previous) = displaced {
            previous.probe_task.abort();
            previous.event_task.abort();
            let _ = previous.widget.dispose().await;
        }

        if let Some((event_task, probe_task)) = superseded {
            debug!("meeting: discarding widget from a superseded start");
            probe_task.abort();
            event_task.abort();
            let _ = widget.dispose().await;
        }

        Ok(())
    }

    async fn release_active(&self) {
        let active = {
            let mut guard = self.active.lock().await;
            guard.take()
        };
        if let Some(active) = active {
            active.probe_task.abort();
            active.event_task.abort();
            let _ = active.widget.dispose().await;
        }
    }

    /// Release the active widget only if no start or stop has happened
    /// since `epoch` was read. Locks inner before active like the install
    /// path, so a concurrent restart either installs after this check or
    /// finds the slot already empty.
    async fn release_if_current(&self, epoch: u64) {
        let active = {
            let inner = self.inner.lock().await;
            if inner.session_epoch != epoch {
                debug!("meeting: skipping release for a superseded close");
                return;
            }
            self.active.lock().await.take()
        };
        if let Some(active) = active {
            active.probe_task.abort();
            active.event_task.abort();
            let _ = active.widget.dispose().await;
        }
    }

    fn spawn_widget_event_task(self: &Arc<Self>, widget: Arc<dyn JitsiWidget>) -> JoinHandle<()> {
        let mut events = widget.subscribe_events();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                controller.handle_widget_event(event).await;
            }
        })
    }

    fn spawn_probe_task(self: &Arc<Self>, widget: Arc<dyn JitsiWidget>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let interval = self.config.probe_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match widget.participant_count().await {
                    Ok(count) => {
                        debug!("meeting: probe ok participants={count}");
                    }
                    Err(err) => {
                        warn!("meeting: probe failed: {err}");
                        controller
                            .handle_connection_loss(FailureCause::ProbeFailure)
                            .await;
                        // The next start sequence schedules a fresh probe.
                        break;
                    }
                }
            }
        })
    }

    async fn handle_widget_event(self: &Arc<Self>, event: JitsiWidgetEvent) {
        match event {
            JitsiWidgetEvent::ConnectionEstablished => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.reconnect_attempts = 0;
                    inner.reconnect_in_flight = false;
                }
                self.transition_to(ConnectionState::Connected).await;
            }
            JitsiWidgetEvent::VideoConferenceJoined => {
                self.transition_to(ConnectionState::Connected).await;
            }
            JitsiWidgetEvent::VideoConferenceLeft => {
                self.transition_to(ConnectionState::Left).await;
            }
            JitsiWidgetEvent::ReadyToClose => {
                if let Some(epoch) = self.transition_to(ConnectionState::Closed).await {
                    // Dispose from a detached task: teardown aborts the
                    // event task this handler is running on. The epoch
                    // gate keeps a restart that lands first intact.
                    let controller = Arc::clone(self);
                    tokio::spawn(async move {
                        controller.release_if_current(epoch).await;
                    });
                }
            }
            JitsiWidgetEvent::ConnectionFailed => {
                self.handle_connection_loss(FailureCause::ConnectionFailed)
                    .await;
            }
            JitsiWidgetEvent::SuspendDetected => {
                self.handle_connection_loss(FailureCause::SuspendDetected)
                    .await;
            }
            JitsiWidgetEvent::ErrorOccurred(fault) => {
                if is_service_disruption(&fault) {
                    warn!(
                        "meeting: service disruption name={} fatal={}",
                        fault.name, fault.is_fatal
                    );
                    self.handle_connection_loss(FailureCause::ServiceError).await;
                } else {
                    info!(
                        "meeting: widget fault name={} message={}",
                        fault.name, fault.message
                    );
                    let _ = self.events.send(MeetingEvent::WidgetFault {
                        name: fault.name,
                        message: fault.message,
                    });
                }
            }
        }
    }

    async fn handle_connection_loss(self: &Arc<Self>, cause: FailureCause) {
        let max = self.config.max_reconnect_attempts;
        let attempt = {
            let mut inner = self.inner.lock().await;
            if !inner.state.can_transition(ConnectionState::Reconnecting) {
                debug!("meeting: ignoring {cause} in state {}", inner.state);
                return;
            }
            if inner.reconnect_in_flight {
                debug!("meeting: reconnect already in flight; ignoring {cause}");
                return;
            }
            inner.reconnect_attempts += 1;
            if inner.reconnect_attempts >= max {
                // Terminal. Set under the same lock so a failure racing in
                // from the other task sees it and is ignored.
                Err(std::mem::replace(&mut inner.state, ConnectionState::Failed))
            } else {
                inner.reconnect_in_flight = true;
                Ok((inner.reconnect_attempts, inner.session_epoch))
            }
        };

        match attempt {
            Err(previous) => {
                warn!("meeting: giving up after {max} attempts cause={cause}");
                info!("meeting: state {previous} -> failed");
                let _ = self
                    .events
                    .send(MeetingEvent::StateChanged(ConnectionState::Failed));
            }
            Ok((attempt, epoch)) => {
                info!("meeting: reconnect attempt {attempt}/{max} cause={cause}");
                self.transition_to(ConnectionState::Reconnecting).await;
                let _ = self.events.send(MeetingEvent::ReconnectScheduled {
                    attempt,
                    max,
                    cause,
                });
                // Restart from a detached task: the start sequence aborts
                // the event and probe tasks this call may be running on.
                let controller = Arc::clone(self);
                tokio::spawn(async move {
                    controller.run_reconnect(epoch).await;
                });
            }
        }
    }

    async fn run_reconnect(self: &Arc<Self>, epoch: u64) {
        let params = {
            let guard = self.inner.lock().await;
            if guard.session_epoch != epoch {
                debug!("meeting: reconnect superseded before it began");
                return;
            }
            guard.params.clone()
        };
        let Some(params) = params else {
            let mut inner = self.inner.lock().await;
            inner.reconnect_in_flight = false;
            return;
        };

        let result = self.run_start_sequence(params, epoch).await;

        let stale = {
            let mut inner = self.inner.lock().await;
            if inner.session_epoch == epoch {
                inner.reconnect_in_flight = false;
                false
            } else {
                true
            }
        };

        match result {
            Ok(()) => {}
            Err(err) if stale => {
                debug!("meeting: superseded reconnect failed: {err}");
            }
            Err(err) => {
                error!("meeting: reconnect failed: {err}");
                self.transition_to(ConnectionState::Error).await;
            }
        }
    }

    /// Apply `next` if the table allows it. Returns the session epoch the
    /// change was made under, so callers can tie follow-up work to it.
    async fn transition_to(&self, next: ConnectionState) -> Option<u64> {
        let (current, epoch) = {
            let mut inner = self.inner.lock().await;
            let current = inner.state;
            if current == next {
                return None;
            }
            if !current.can_transition(next) {
                debug!("meeting: dropping state change {current} -> {next}");
                return None;
            }
            inner.state = next;
            (current, inner.session_epoch)
        };
        info!("meeting: state {current} -> {next}");
        let _ = self.events.send(MeetingEvent::StateChanged(next));
        Some(epoch)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
