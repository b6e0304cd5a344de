//! # Dashboard
//!
//! Owns every long-running piece of the live view and their shared teardown
//! token:
//! - the reconciler, sole writer of the canonical state
//! - the snapshot poller
//! - the stream supervisor, which decides whether a dropped stream is reopened
//! - the render loop, which turns published snapshots into scenes
//!
//! Commands go straight to the backend and are followed by an immediate
//! refresh so the view does not wait for the next poll.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, CommandAck};
use crate::config::Config;
use crate::domain::{Node, NodeId};
use crate::error::{SelectionError, SyncError};
use crate::render::{InputEvent, Point2, Renderer, SceneSink};
use crate::sync::{
    ListenerExit, ListenerHandle, Reconciler, RefreshTrigger, SnapshotPoller, StateSnapshot,
    StoreHandle, SyncEvent,
};

const EVENT_QUEUE: usize = 256;
const INPUT_QUEUE: usize = 64;

pub struct Dashboard {
    client: BackendClient,
    store: StoreHandle,
    trigger: RefreshTrigger,
    inputs: mpsc::Sender<InputEvent>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    /// Spawn all tasks on the current runtime.
    pub fn start(cfg: &Config, sink: Box<dyn SceneSink>) -> Result<Self> {
        let client = BackendClient::new(
            cfg.backend.base_url.clone(),
            &cfg.backend.user_agent,
            Duration::from_millis(cfg.poller.resource_timeout_ms),
            cfg.state.default_battery_capacity,
        )
        .context("failed to build backend client")?;

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel::<SyncEvent>(EVENT_QUEUE);
        let (inputs_tx, inputs_rx) = mpsc::channel::<InputEvent>(INPUT_QUEUE);
        let mut tasks = Vec::new();

        let (reconciler, store) = Reconciler::new(cfg.reconciler_settings());
        tasks.push(tokio::spawn(reconciler.run(events_rx, cancel.clone())));

        let poller = SnapshotPoller::new(Arc::new(client.clone()), cfg.poller_settings());
        let trigger = poller.trigger();
        tasks.push(tokio::spawn(poller.run(events_tx.clone(), cancel.clone())));

        if cfg.stream.enabled {
            let url = cfg.backend.stream_url()?;
            tasks.push(tokio::spawn(supervise_stream(
                url,
                events_tx,
                cancel.clone(),
                cfg.stream.reconnect_delay(),
            )));
        } else {
            info!("stream disabled, running on polls only");
        }

        let renderer = Renderer::new(
            cfg.layout_settings(),
            cfg.animator_settings(),
            cfg.interaction.hit_radius,
        );
        tasks.push(tokio::spawn(render_loop(
            store.clone(),
            renderer,
            sink,
            inputs_rx,
            cfg.render.frame_interval(),
            cancel.clone(),
        )));

        info!(base_url = %cfg.backend.base_url, "dashboard started");
        Ok(Self {
            client,
            store,
            trigger,
            inputs: inputs_tx,
            cancel,
            tasks,
        })
    }

    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.store.snapshot()
    }

    pub fn refresh_now(&self) {
        self.trigger.refresh_now();
    }

    /// Pointer input at a 2-D layout location
    pub fn pointer(&self, at: Point2) {
        self.send_input(InputEvent::Pointer(at));
    }

    /// Select a node by id; it must be present in the latest snapshot.
    pub fn select(&self, id: NodeId) -> Result<(), SelectionError> {
        if !self.store.snapshot().state.contains_node(id) {
            return Err(SelectionError::UnknownNode(id));
        }
        self.send_input(InputEvent::Select(id));
        Ok(())
    }

    pub fn close_selection(&self) {
        self.send_input(InputEvent::Close);
    }

    fn send_input(&self, input: InputEvent) {
        // input never waits on the render loop
        if let Err(e) = self.inputs.try_send(input) {
            debug!(error = %e, "input dropped");
        }
    }

    pub async fn start_simulation(&self, num_agents: u32, hours: u32) -> Result<CommandAck, SyncError> {
        let ack = self.client.start_simulation(num_agents, hours).await?;
        self.refresh_now();
        Ok(ack)
    }

    pub async fn stop_simulation(&self) -> Result<CommandAck, SyncError> {
        let ack = self.client.stop_simulation().await?;
        self.refresh_now();
        Ok(ack)
    }

    pub async fn run_scenario(
        &self,
        scenario_type: &str,
        parameters: Option<Value>,
    ) -> Result<CommandAck, SyncError> {
        let ack = self.client.run_scenario(scenario_type, parameters).await?;
        self.refresh_now();
        Ok(ack)
    }

    pub async fn agent(&self, id: NodeId) -> Result<Node, SyncError> {
        self.client.agent(id).await
    }

    /// Cancel every task and wait for them. Nothing is applied or rendered
    /// after this returns.
    pub async fn shutdown(mut self) {
        info!("dashboard shutting down");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "dashboard task failed");
            }
        }
        info!("dashboard stopped");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open the stream and apply the reconnect policy when it ends.
async fn supervise_stream(
    url: String,
    events: mpsc::Sender<SyncEvent>,
    cancel: CancellationToken,
    reconnect: Option<Duration>,
) {
    loop {
        let handle = ListenerHandle::spawn(url.clone(), events.clone(), &cancel);
        match handle.join().await {
            ListenerExit::Closed | ListenerExit::QueueClosed => return,
            ListenerExit::Disconnected => info!(%url, "stream disconnected"),
            ListenerExit::Failed(e) => warn!(%url, error = %e, "stream unavailable"),
        }

        let Some(delay) = reconnect else {
            info!("stream will not be reopened, continuing on polls");
            return;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => debug!(%url, "reopening stream"),
        }
    }
}

async fn render_loop(
    store: StoreHandle,
    mut renderer: Renderer,
    mut sink: Box<dyn SceneSink>,
    mut inputs: mpsc::Receiver<InputEvent>,
    frame_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = store.snapshot();
        while let Ok(input) = inputs.try_recv() {
            if let Err(e) = renderer.handle(input, &snapshot) {
                debug!(error = %e, "input ignored");
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;
        let scene = renderer.frame(&snapshot, dt);
        sink.present(&scene);
    }
    debug!("render loop stopped");
}
