//! Controller-facing trait implementations backed by the page relay.
//!
//! Requests go out as [`BridgeCommand`]s on the session's command channel;
//! replies come back through [`PageBridge::handle_event`] and are matched
//! to the waiting caller. Every wait carries a timeout so a dead page
//! fails the calling path instead of hanging the controller.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use jitsi_integration::{
    external_api_url, ExternalApiLoader, JitsiWidget, JitsiWidgetEvent, JitsiWidgetFactory,
    JitsiWidgetOptions,
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, Mutex},
    time::timeout,
};

use super::protocol::{BridgeCommand, BridgeEvent};

const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) struct PageBridge {
    shared: Arc<BridgeShared>,
}

struct PageWidgetFactory {
    shared: Arc<BridgeShared>,
}

struct PageWidget {
    shared: Arc<BridgeShared>,
    // Receiver subscribed when the page acknowledged the construction, so
    // events relayed before the controller attaches are already buffered.
    primed_events: StdMutex<Option<broadcast::Receiver<JitsiWidgetEvent>>>,
}

struct BridgeShared {
    jitsi_domain: String,
    commands: mpsc::Sender<BridgeCommand>,
    reply_timeout: Duration,
    pending: Mutex<PendingReplies>,
    widget_events: broadcast::Sender<JitsiWidgetEvent>,
}

#[derive(Default)]
struct PendingReplies {
    script_loaded: bool,
    script_waiters: Vec<oneshot::Sender<Result<(), String>>>,
    // Creation replies arrive in command order, so a queue pairs them up.
    // Success carries the event receiver subscribed at ack time.
    create_waiters: VecDeque<oneshot::Sender<CreateReply>>,
    next_probe_id: u64,
    probe_waiters: HashMap<u64, oneshot::Sender<Result<usize, String>>>,
}

type CreateReply = Result<broadcast::Receiver<JitsiWidgetEvent>, String>;

impl PageBridge {
    pub(crate) fn new(jitsi_domain: String, commands: mpsc::Sender<BridgeCommand>) -> Arc<Self> {
        Self::new_with_timeout(jitsi_domain, commands, DEFAULT_REPLY_TIMEOUT)
    }

    pub(crate) fn new_with_timeout(
        jitsi_domain: String,
        commands: mpsc::Sender<BridgeCommand>,
        reply_timeout: Duration,
    ) -> Arc<Self> {
        let (widget_events, _) = broadcast::channel(1024);
        Arc::new(Self {
            shared: Arc::new(BridgeShared {
                jitsi_domain,
                commands,
                reply_timeout,
                pending: Mutex::new(PendingReplies::default()),
                widget_events,
            }),
        })
    }

    /// Feed one decoded page event into the bridge. Replies complete their
    /// waiting caller; forwarded widget events fan out to subscribers.
    pub(crate) async fn handle_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::ScriptReady => {
                let mut pending = self.shared.pending.lock().await;
                pending.script_loaded = true;
                for waiter in pending.script_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            BridgeEvent::ScriptFailed { reason } => {
                let mut pending = self.shared.pending.lock().await;
                for waiter in pending.script_waiters.drain(..) {
                    let _ = waiter.send(Err(reason.clone()));
                }
            }
            BridgeEvent::WidgetCreated => {
                let mut pending = self.shared.pending.lock().await;
                if let Some(waiter) = pending.create_waiters.pop_front() {
                    // Subscribe on the ack itself: an event relayed in the
                    // same socket read lands in this receiver instead of a
                    // channel with no subscribers yet.
                    let _ = waiter.send(Ok(self.shared.widget_events.subscribe()));
                }
            }
            BridgeEvent::WidgetFailed { reason } => {
                let mut pending = self.shared.pending.lock().await;
                if let Some(waiter) = pending.create_waiters.pop_front() {
                    let _ = waiter.send(Err(reason));
                }
            }
            BridgeEvent::Widget(event) => {
                let _ = self.shared.widget_events.send(event);
            }
            BridgeEvent::ParticipantCount { probe_id, count } => {
                let mut pending = self.shared.pending.lock().await;
                if let Some(waiter) = pending.probe_waiters.remove(&probe_id) {
                    let _ = waiter.send(Ok(count));
                }
            }
            BridgeEvent::ProbeFailed { probe_id, reason } => {
                let mut pending = self.shared.pending.lock().await;
                if let Some(waiter) = pending.probe_waiters.remove(&probe_id) {
                    let _ = waiter.send(Err(reason));
                }
            }
        }
    }
}

impl BridgeShared {
    async fn send(&self, command: BridgeCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("bridge session is closed"))
    }
}

#[async_trait]
impl ExternalApiLoader for PageBridge {
    async fn ensure_loaded(&self) -> Result<Arc<dyn JitsiWidgetFactory>> {
        let waiter = {
            let mut pending = self.shared.pending.lock().await;
            if pending.script_loaded {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                let first = pending.script_waiters.is_empty();
                pending.script_waiters.push(tx);
                Some((rx, first))
            }
        };

        if let Some((reply, first)) = waiter {
            if first {
                let script_url = external_api_url(&self.shared.jitsi_domain);
                self.shared
                    .send(BridgeCommand::LoadScript { script_url })
                    .await?;
            }
            match timeout(self.shared.reply_timeout, reply).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(reason))) => {
                    return Err(anyhow!("page failed to load the script: {reason}"));
                }
                Ok(Err(_)) => {
                    return Err(anyhow!("bridge session ended while loading the script"));
                }
                Err(_) => {
                    // Forget the stalled load so an explicit restart sends
                    // a fresh load_script instead of waiting behind it.
                    self.shared.pending.lock().await.script_waiters.clear();
                    return Err(anyhow!(
                        "page did not answer load_script within {:?}",
                        self.shared.reply_timeout
                    ));
                }
            }
        }

        Ok(Arc::new(PageWidgetFactory {
            shared: Arc::clone(&self.shared),
        }))
    }
}

#[async_trait]
impl JitsiWidgetFactory for PageWidgetFactory {
    async fn create(&self, options: JitsiWidgetOptions) -> Result<Arc<dyn JitsiWidget>> {
        let reply = {
            let mut pending = self.shared.pending.lock().await;
            let (tx, rx) = oneshot::channel();
            pending.create_waiters.push_back(tx);
            rx
        };
        self.shared
            .send(BridgeCommand::CreateWidget {
                domain: self.shared.jitsi_domain.clone(),
                options,
            })
            .await?;

        match timeout(self.shared.reply_timeout, reply).await {
            Ok(Ok(Ok(events))) => Ok(Arc::new(PageWidget {
                shared: Arc::clone(&self.shared),
                primed_events: StdMutex::new(Some(events)),
            })),
            Ok(Ok(Err(reason))) => Err(anyhow!("page failed to construct the widget: {reason}")),
            Ok(Err(_)) => Err(anyhow!("bridge session ended while constructing the widget")),
            Err(_) => {
                // Drop the abandoned waiter so a later ack pairs with a
                // live caller instead of starving it.
                self.shared
                    .pending
                    .lock()
                    .await
                    .create_waiters
                    .retain(|tx| !tx.is_closed());
                Err(anyhow!(
                    "page did not answer create_widget within {:?}",
                    self.shared.reply_timeout
                ))
            }
        }
    }
}

#[async_trait]
impl JitsiWidget for PageWidget {
    async fn dispose(&self) -> Result<()> {
        self.shared.send(BridgeCommand::DisposeWidget).await
    }

    async fn participant_count(&self) -> Result<usize> {
        let (probe_id, reply) = {
            let mut pending = self.shared.pending.lock().await;
            let probe_id = pending.next_probe_id;
            pending.next_probe_id += 1;
            let (tx, rx) = oneshot::channel();
            pending.probe_waiters.insert(probe_id, tx);
            (probe_id, rx)
        };

        if let Err(err) = self
            .shared
            .send(BridgeCommand::QueryParticipants { probe_id })
            .await
        {
            self.shared
                .pending
                .lock()
                .await
                .probe_waiters
                .remove(&probe_id);
            return Err(err);
        }

        match timeout(self.shared.reply_timeout, reply).await {
            Ok(Ok(Ok(count))) => Ok(count),
            Ok(Ok(Err(reason))) => Err(anyhow!("page probe failed: {reason}")),
            Ok(Err(_)) => Err(anyhow!("bridge session ended during the probe")),
            Err(_) => {
                self.shared
                    .pending
                    .lock()
                    .await
                    .probe_waiters
                    .remove(&probe_id);
                Err(anyhow!(
                    "page did not answer probe {probe_id} within {:?}",
                    self.shared.reply_timeout
                ))
            }
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<JitsiWidgetEvent> {
        if let Ok(mut primed) = self.primed_events.lock() {
            if let Some(events) = primed.take() {
                return events;
            }
        }
        self.shared.widget_events.subscribe()
    }
}
