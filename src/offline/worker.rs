//! Offline worker lifecycle
//!
//! A worker moves through `Parsed -> Installing -> Installed -> Activating ->
//! Activated`. Each phase completes only when its future resolves. Only an
//! activated worker intercepts fetches.
//!
//! [`ServiceWorker::spawn`] runs the worker as a task fed by an event
//! channel. Lifecycle events and control messages are processed in order;
//! fetch and sync events are handed to their own tasks so unrelated
//! requests never wait on each other.

use crate::error::{PostroomError, PostroomResult};
use crate::offline::controller::{CacheController, FetchOutcome};
use crate::offline::request::Request;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_QUEUE_DEPTH: usize = 64;

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take over
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed (waiting)"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

/// Control messages a page can post to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker immediately
    SkipWaiting,
}

/// An offline worker instance
pub struct ServiceWorker {
    id: Uuid,
    controller: Arc<CacheController>,
    state: WorkerState,
    skip_waiting: bool,
    clients_claimed: bool,
}

impl ServiceWorker {
    /// A freshly parsed worker
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self {
            id: Uuid::new_v4(),
            controller,
            state: WorkerState::Parsed,
            skip_waiting: false,
            clients_claimed: false,
        }
    }

    /// Recreate a worker in a previously reached state
    pub fn restore(controller: Arc<CacheController>, id: Uuid, state: WorkerState) -> Self {
        // An interrupted phase has to run again
        let state = match state {
            WorkerState::Installing => WorkerState::Parsed,
            WorkerState::Activating => WorkerState::Installed,
            other => other,
        };
        Self {
            id,
            controller,
            state,
            skip_waiting: false,
            clients_claimed: state == WorkerState::Activated,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    pub fn controller(&self) -> &Arc<CacheController> {
        &self.controller
    }

    /// Request activation without waiting for existing clients to close
    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Run the install phase, then activate straight away if skip-waiting
    /// was requested
    pub async fn install(&mut self) -> WorkerState {
        if self.state != WorkerState::Parsed {
            debug!("Worker {} already past install ({})", self.id, self.state);
            return self.state;
        }

        self.state = WorkerState::Installing;
        self.controller.install().await;
        if self.controller.settings().skip_waiting_on_install {
            self.skip_waiting();
        }
        self.state = WorkerState::Installed;
        info!(worker = %self.id, "Worker installed");

        if self.skip_waiting {
            return self.activate().await;
        }
        self.state
    }

    /// Run the activate phase: prune stale partitions, then claim clients
    pub async fn activate(&mut self) -> WorkerState {
        match self.state {
            WorkerState::Installed => {}
            WorkerState::Activated => return self.state,
            other => {
                warn!("Cannot activate worker {} while {}", self.id, other);
                return other;
            }
        }

        self.state = WorkerState::Activating;
        match self.controller.activate().await {
            Ok(deleted) if !deleted.is_empty() => {
                info!("Removed {} stale partition(s)", deleted.len());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to prune stale partitions"),
        }
        self.state = WorkerState::Activated;
        self.clients_claimed = true;
        info!(worker = %self.id, "Worker activated and controlling clients");
        self.state
    }

    /// Handle a message posted by a page
    pub async fn handle_message(&mut self, payload: &serde_json::Value) -> WorkerState {
        match serde_json::from_value::<ControlMessage>(payload.clone()) {
            Ok(ControlMessage::SkipWaiting) => {
                debug!("Skip waiting requested");
                self.skip_waiting();
                if self.state == WorkerState::Installed {
                    return self.activate().await;
                }
            }
            Err(_) => debug!("Ignoring unrecognized message {}", payload),
        }
        self.state
    }

    /// Intercept a request; only an activated worker handles fetches
    pub async fn fetch(&self, request: &Request) -> PostroomResult<FetchOutcome> {
        if self.state != WorkerState::Activated {
            return Ok(FetchOutcome::Passthrough);
        }
        self.controller.handle_fetch(request).await
    }

    /// Handle a background sync event
    pub async fn sync(&self, tag: &str) -> bool {
        self.controller.sync(tag).await
    }

    /// Run the worker on its own task
    pub fn spawn(self) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let handle = WorkerHandle { id: self.id, tx };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<WorkerEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Install(reply) => {
                    let _ = reply.send(self.install().await);
                }
                WorkerEvent::Activate(reply) => {
                    let _ = reply.send(self.activate().await);
                }
                WorkerEvent::Message(payload, reply) => {
                    let _ = reply.send(self.handle_message(&payload).await);
                }
                WorkerEvent::State(reply) => {
                    let _ = reply.send(self.state);
                }
                WorkerEvent::Fetch(request, reply) => {
                    if self.state != WorkerState::Activated {
                        let _ = reply.send(Ok(FetchOutcome::Passthrough));
                        continue;
                    }
                    let controller = self.controller.clone();
                    tokio::spawn(async move {
                        let _ = reply.send(controller.handle_fetch(&request).await);
                    });
                }
                WorkerEvent::Sync(tag, reply) => {
                    let controller = self.controller.clone();
                    tokio::spawn(async move {
                        let _ = reply.send(controller.sync(&tag).await);
                    });
                }
            }
        }
        debug!("Worker {} stopped", self.id);
    }
}

enum WorkerEvent {
    Install(oneshot::Sender<WorkerState>),
    Activate(oneshot::Sender<WorkerState>),
    Message(serde_json::Value, oneshot::Sender<WorkerState>),
    State(oneshot::Sender<WorkerState>),
    Fetch(Request, oneshot::Sender<PostroomResult<FetchOutcome>>),
    Sync(String, oneshot::Sender<bool>),
}

/// Sends events to a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    id: Uuid,
    tx: mpsc::Sender<WorkerEvent>,
}

impl WorkerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> WorkerEvent,
    ) -> PostroomResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(event(reply))
            .await
            .map_err(|_| PostroomError::WorkerGone(self.id.to_string()))?;
        rx.await
            .map_err(|_| PostroomError::WorkerGone(self.id.to_string()))
    }

    pub async fn install(&self) -> PostroomResult<WorkerState> {
        self.request(WorkerEvent::Install).await
    }

    pub async fn activate(&self) -> PostroomResult<WorkerState> {
        self.request(WorkerEvent::Activate).await
    }

    pub async fn state(&self) -> PostroomResult<WorkerState> {
        self.request(WorkerEvent::State).await
    }

    /// Post a JSON message, e.g. `{"type": "SKIP_WAITING"}`
    pub async fn post_message(&self, payload: serde_json::Value) -> PostroomResult<WorkerState> {
        self.request(|reply| WorkerEvent::Message(payload, reply))
            .await
    }

    pub async fn fetch(&self, request: Request) -> PostroomResult<FetchOutcome> {
        self.request(|reply| WorkerEvent::Fetch(request, reply))
            .await?
    }

    pub async fn sync(&self, tag: impl Into<String>) -> PostroomResult<bool> {
        let tag = tag.into();
        self.request(|reply| WorkerEvent::Sync(tag, reply)).await
    }
}
