//! Serve loop for the repository-server end of the message protocol.
//!
//! The server shares the client's transport and message primitives; what
//! differs is dispatch. Inbound messages are routed by `command` to a
//! [`CommandHandler`], and the handler's reply body is routed back with
//! `to`/`from` reversed and the request's `requestId` mirrored into
//! `responseId`, the key the client's listener correlates on.

use crate::comm::transport::Transport;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::message::{commands, keys, Message};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Server-side dispatch for inbound commands.
///
/// Returns the reply body; the serve loop fills in the routing keys.
/// `None` drops the request without a reply.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, command: &str, request: &Message) -> Option<Message>;
}

/// A running repository server.
pub struct RepoServer;

/// Handle to a running repository server.
pub struct RepoServerHandle {
    local: Endpoint,
    transport: Arc<Transport>,
    task: Option<JoinHandle<()>>,
}

impl RepoServer {
    /// Bind `endpoint` and run the serve loop until the quit sentinel
    /// arrives. Port 0 binds an OS-assigned port.
    pub async fn start<H: CommandHandler>(
        endpoint: &Endpoint,
        handler: Arc<H>,
    ) -> Result<RepoServerHandle> {
        let transport = Arc::new(Transport::bind(endpoint).await?);
        let local = transport.local().clone();
        info!(%local, "repository server listening");

        let task = tokio::spawn(serve_loop(transport.clone(), handler));

        Ok(RepoServerHandle {
            local,
            transport,
            task: Some(task),
        })
    }
}

impl RepoServerHandle {
    /// The endpoint the server is listening on.
    pub fn endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Post the quit sentinel to the serve loop and await its exit.
    pub async fn stop(mut self) -> Result<()> {
        let mut sentinel = Message::new();
        sentinel.set_recipient(&self.local);
        sentinel.set_sender(&self.local);
        sentinel.set_command(commands::QUIT);
        self.transport.post(sentinel).await?;

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.transport.shutdown();
        Ok(())
    }
}

impl Drop for RepoServerHandle {
    fn drop(&mut self) {
        // A handle dropped without `stop` takes the serve loop down with it.
        if let Some(task) = self.task.take() {
            self.transport.shutdown();
            task.abort();
        }
    }
}

async fn serve_loop<H: CommandHandler>(transport: Arc<Transport>, handler: Arc<H>) {
    while let Some(request) = transport.recv().await {
        if request.verbose() {
            debug!(
                command = request.command().unwrap_or_default(),
                from = request.sender().unwrap_or_default(),
                "received request"
            );
        }
        let Some(command) = request.command().map(str::to_owned) else {
            debug!("inbound message carries no command, dropping");
            continue;
        };
        if command == commands::QUIT {
            debug!("quit sentinel received, serve loop exiting");
            break;
        }

        let Some(mut reply) = handler.handle(&command, &request).await else {
            debug!(%command, "no handler reply, dropping request");
            continue;
        };

        // Route back: to/from reversed, requestId echoed as responseId.
        if let Some(sender) = request.sender() {
            reply.insert(keys::TO, sender);
        }
        if let Some(recipient) = request.recipient() {
            reply.insert(keys::FROM, recipient);
        }
        if let Some(request_id) = request.request_id() {
            reply.insert(keys::RESPONSE_ID, request_id);
        }

        if let Err(e) = transport.post(reply).await {
            warn!(%command, error = %e, "failed to post reply");
        }
    }
}
