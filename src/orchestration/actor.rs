//! A minimal named-actor runtime on top of tokio.
//!
//! Each actor owns its state inside a tokio task on the shared runtime and is reached through a
//! bounded mailbox. Requests and responses cross the mailbox JSON-encoded, so an actor only ever
//! sees values that survived serialization. Names are registered process-wide and released when
//! the actor is killed or its handle dropped.
//!
//! Handles block the calling thread while a call is in flight and must not be used from inside
//! an async context.

use crate::orchestration::tokio::utils::get_or_init_tokio_runtime;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

static ACTOR_NAMES: Lazy<RwLock<HashSet<String>>> = Lazy::new(|| RwLock::new(HashSet::new()));

/// Failures of the actor runtime itself.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorError {
    #[error("actor name {0} is already taken")]
    NameTaken(String),
    #[error("actor {0} is unreachable")]
    Unreachable(String),
    #[error("actor message could not be serialized: {0}")]
    Serialization(String),
}

/// State hosted by an actor.
pub trait Actor: Send + 'static {
    type Request: Serialize + DeserializeOwned;
    type Response: Serialize + DeserializeOwned;
    type Error: Serialize + DeserializeOwned + From<ActorError> + Send + 'static;

    fn handle(&mut self, request: Self::Request) -> Result<Self::Response, Self::Error>;
}

enum Mail {
    Call {
        payload: String,
        reply: oneshot::Sender<String>,
    },
    Kill {
        ack: Option<oneshot::Sender<()>>,
    },
}

fn register_name(name: &str) -> Result<(), ActorError> {
    let mut registry = ACTOR_NAMES.write().expect("Actor name registry unavailable");
    if !registry.insert(name.to_string()) {
        return Err(ActorError::NameTaken(name.to_string()));
    }
    Ok(())
}

fn release_name(name: &str) {
    let mut registry = ACTOR_NAMES.write().expect("Actor name registry unavailable");
    registry.remove(name);
}

/// Whether an actor named `name` is currently alive.
pub fn is_actor_name_taken(name: &str) -> bool {
    ACTOR_NAMES
        .read()
        .expect("Actor name registry unavailable")
        .contains(name)
}

/// Handle to a running actor.
pub struct ActorHandle<A: Actor> {
    name: String,
    sender: mpsc::Sender<Mail>,
    alive: bool,
    _actor: PhantomData<fn() -> A>,
}

/// Spawns an actor named `name` whose state is built by `init` inside the actor task.
///
/// Blocks until `init` has run; its error is returned as the actor reported it.
pub fn spawn_actor<A, F>(
    name: &str,
    mailbox_capacity: usize,
    init: F,
) -> Result<ActorHandle<A>, A::Error>
where
    A: Actor,
    F: FnOnce() -> Result<A, A::Error> + Send + 'static,
{
    register_name(name)?;

    let (sender, mut receiver) = mpsc::channel::<Mail>(mailbox_capacity.max(1));
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
    let actor_name = name.to_string();

    get_or_init_tokio_runtime().spawn(async move {
        let mut actor: A = match init() {
            Ok(actor) => {
                let _ = ready_tx.send(Ok(()));
                actor
            }
            Err(e) => {
                let _ = ready_tx.send(Err(serde_json::to_string(&e).unwrap_or_default()));
                return;
            }
        };

        while let Some(mail) = receiver.recv().await {
            match mail {
                Mail::Call { payload, reply } => {
                    let result: Result<A::Response, A::Error> =
                        match serde_json::from_str::<A::Request>(&payload) {
                            Ok(request) => actor.handle(request),
                            Err(e) => Err(ActorError::Serialization(e.to_string()).into()),
                        };
                    let encoded: String = serde_json::to_string(&result).unwrap_or_default();
                    if reply.send(encoded).is_err() {
                        warn!(
                            "[Actor - run] Caller of actor {} went away before the reply",
                            actor_name
                        );
                    }
                }
                Mail::Kill { ack } => {
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }
        debug!("[Actor - run] Actor {} stopped", actor_name);
    });

    let ready: Result<(), String> = match ready_rx.blocking_recv() {
        Ok(ready) => ready,
        Err(_) => {
            release_name(name);
            return Err(ActorError::Unreachable(name.to_string()).into());
        }
    };
    if let Err(encoded) = ready {
        release_name(name);
        let error: A::Error = serde_json::from_str(&encoded)
            .map_err(|e| A::Error::from(ActorError::Serialization(e.to_string())))?;
        return Err(error);
    }

    info!("[Actor - spawn_actor] Spawned actor {}", name);
    Ok(ActorHandle {
        name: name.to_string(),
        sender,
        alive: true,
        _actor: PhantomData,
    })
}

impl<A: Actor> ActorHandle<A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Sends `request` to the actor and waits for its response.
    pub fn call(&self, request: &A::Request) -> Result<A::Response, A::Error> {
        if !self.alive {
            return Err(ActorError::Unreachable(self.name.clone()).into());
        }
        let payload: String = serde_json::to_string(request)
            .map_err(|e| A::Error::from(ActorError::Serialization(e.to_string())))?;
        let (reply_tx, reply_rx) = oneshot::channel::<String>();
        self.sender
            .blocking_send(Mail::Call {
                payload,
                reply: reply_tx,
            })
            .map_err(|_| A::Error::from(ActorError::Unreachable(self.name.clone())))?;
        let reply: String = reply_rx
            .blocking_recv()
            .map_err(|_| A::Error::from(ActorError::Unreachable(self.name.clone())))?;
        debug!(
            "[ActorHandle - call] Actor {} replied with {} bytes",
            self.name,
            reply.len()
        );
        serde_json::from_str::<Result<A::Response, A::Error>>(&reply)
            .map_err(|e| A::Error::from(ActorError::Serialization(e.to_string())))?
    }

    /// Stops the actor and releases its name. Killing a stopped actor does nothing.
    pub fn kill(&mut self) -> Result<(), ActorError> {
        if !self.alive {
            return Ok(());
        }
        self.alive = false;
        release_name(&self.name);
        let (ack_tx, ack_rx) = oneshot::channel::<()>();
        self.sender
            .blocking_send(Mail::Kill { ack: Some(ack_tx) })
            .map_err(|_| ActorError::Unreachable(self.name.clone()))?;
        ack_rx
            .blocking_recv()
            .map_err(|_| ActorError::Unreachable(self.name.clone()))?;
        info!("[ActorHandle - kill] Killed actor {}", self.name);
        Ok(())
    }
}

impl<A: Actor> Drop for ActorHandle<A> {
    fn drop(&mut self) {
        if self.alive {
            self.alive = false;
            release_name(&self.name);
            // the mailbox closing stops the actor as well once this handle is gone
            let _ = self.sender.try_send(Mail::Kill { ack: None });
            debug!("[ActorHandle - drop] Released actor {}", self.name);
        }
    }
}
