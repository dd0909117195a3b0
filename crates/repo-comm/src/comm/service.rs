//! Comm service: owns the local endpoint, the transport, the dispatch
//! table, and the background listener that correlates responses back to
//! their callbacks.
//!
//! # Shutdown protocol
//!
//! `stop` posts a self-addressed `__quit` sentinel carrying a fresh
//! correlation ID in `responseId`. The listener exits its receive cycle on
//! seeing the sentinel and, as its last act, dispatches the sentinel like
//! any other response. The sentinel's callback then tears the transport
//! down and invokes the caller's `on_stopped`, so the caller learns when
//! receive has actually ceased, not merely when the stop was requested.

use crate::comm::dispatch::{correlation_id, DispatchTable};
use crate::comm::requests::Requests;
use crate::comm::transport::Transport;
use crate::endpoint::Endpoint;
use crate::error::{CommError, Result};
use crate::message::{commands, Message};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// The client's communication endpoint.
///
/// Construct one per process and share it by reference; the process-wide
/// single-binding contract is carried by construct-once-and-share rather
/// than a hidden global.
pub struct CommService {
    bind: Endpoint,
    dispatch: Arc<DispatchTable>,
    started: Mutex<Option<Started>>,
}

struct Started {
    local: Endpoint,
    transport: Arc<Transport>,
    requests: Arc<Requests>,
    listener: tokio::task::JoinHandle<()>,
}

impl CommService {
    /// A service that will bind its listener at `bind_host:bind_port`.
    pub fn new(bind_host: impl Into<String>, bind_port: u16) -> Self {
        Self {
            bind: Endpoint::new(bind_host, bind_port),
            dispatch: Arc::new(DispatchTable::new()),
            started: Mutex::new(None),
        }
    }

    /// Bind the transport, wire the request API to the repository server at
    /// `server_host:server_port`, and start the listener.
    ///
    /// Calling `start` twice without an intervening `stop` is not guarded;
    /// callers track connection state themselves.
    pub async fn start(&self, server_host: impl Into<String>, server_port: u16) -> Result<()> {
        let remote = Endpoint::new(server_host, server_port);
        let transport = Arc::new(Transport::bind(&self.bind).await?);
        let local = transport.local().clone();
        info!(%local, server = %remote, "comm service started");

        let requests = Arc::new(Requests::new(
            transport.clone(),
            self.dispatch.clone(),
            local.clone(),
            remote,
        ));
        let listener = tokio::spawn(listener_loop(transport.clone(), self.dispatch.clone()));

        *self.state() = Some(Started {
            local,
            transport,
            requests,
            listener,
        });
        Ok(())
    }

    /// The request API for the connected server.
    pub fn requests(&self) -> Result<Arc<Requests>> {
        self.state()
            .as_ref()
            .map(|s| s.requests.clone())
            .ok_or(CommError::NotStarted)
    }

    /// The endpoint this service is bound to. Before `start` this is the
    /// configured bind endpoint; after, the actually bound one.
    pub fn endpoint(&self) -> Endpoint {
        self.state()
            .as_ref()
            .map(|s| s.local.clone())
            .unwrap_or_else(|| self.bind.clone())
    }

    /// Initiate the graceful shutdown protocol. `on_stopped` runs exactly
    /// once, after the listener has exited its receive loop and the
    /// transport has been torn down.
    pub async fn stop(&self, on_stopped: impl FnOnce() + Send + 'static) -> Result<()> {
        let Some(started) = self.state().take() else {
            return Err(CommError::NotStarted);
        };
        // The listener handle is dropped here, not aborted: the loop must
        // stay alive to drain and dispatch the sentinel.
        let Started {
            local, transport, ..
        } = started;

        let quit_id = correlation_id();
        let teardown = transport.clone();
        self.dispatch.register(
            quit_id.clone(),
            Box::new(move |_sentinel| {
                teardown.shutdown();
                on_stopped();
            }),
        );

        let mut sentinel = Message::new();
        sentinel.set_recipient(&local);
        sentinel.set_sender(&local);
        sentinel.set_command(commands::QUIT);
        sentinel.set_response_id(&quit_id);
        transport.post(sentinel).await
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Option<Started>> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CommService {
    fn drop(&mut self) {
        // A service dropped without `stop` takes its listener down with it.
        if let Some(started) = self.state().take() {
            started.transport.shutdown();
            started.listener.abort();
        }
    }
}

/// The listener: blocks on the transport's receive primitive and matches
/// inbound messages to pending callbacks. Runs until the transport closes
/// or the quit sentinel arrives.
async fn listener_loop(transport: Arc<Transport>, dispatch: Arc<DispatchTable>) {
    let sentinel = loop {
        let Some(message) = transport.recv().await else {
            debug!("transport closed, listener exiting");
            return;
        };
        if message.verbose() {
            debug!(
                command = message.command().unwrap_or_default(),
                response_id = message.response_id().unwrap_or_default(),
                "received message"
            );
        }
        if message.command() == Some(commands::QUIT) {
            break message;
        }
        dispatch_response(&dispatch, message);
    };

    // The receive cycle is over; delivering the sentinel is the loop's last
    // act, so the stop notification cannot race further inbound traffic.
    debug!("quit sentinel received, listener draining");
    dispatch_response(&dispatch, sentinel);
}

fn dispatch_response(dispatch: &DispatchTable, message: Message) {
    let Some(id) = message.response_id().map(str::to_owned) else {
        debug!("inbound message carries no responseId, dropping");
        return;
    };
    match dispatch.take(&id) {
        Some(handler) => handler(message),
        // Late or duplicate responses are tolerated; this event is the only
        // trace they leave.
        None => debug!(%id, "no pending request for response, dropping"),
    }
}
