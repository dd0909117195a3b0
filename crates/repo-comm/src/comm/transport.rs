//! TCP message transport: a listener socket plus per-destination outbound
//! connections.
//!
//! Each endpoint owns one listener; inbound connections are read in their
//! own tasks, which decode frames into [`Message`]s and push them onto a
//! bounded queue. `recv` is the sole blocking/suspension point for the
//! consumer. Outbound, one connection per destination endpoint is opened
//! lazily and reused (no multiplexing); a failed send drops the cached
//! connection so the next post reconnects.

use crate::comm::wire::{read_frame, write_frame};
use crate::config::CommConfig;
use crate::endpoint::Endpoint;
use crate::error::{CommError, Result};
use crate::message::{keys, Message};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Reliable, ordered delivery of whole messages between two endpoints.
pub struct Transport {
    local: Endpoint,
    inbound: Mutex<mpsc::Receiver<Message>>,
    outbound: Mutex<HashMap<String, TcpStream>>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Transport {
    /// Bind a listener on `local`. Port 0 binds an OS-assigned port; the
    /// returned transport reports the endpoint actually bound.
    pub async fn bind(local: &Endpoint) -> Result<Self> {
        let listener = TcpListener::bind((local.host.as_str(), local.port))
            .await
            .map_err(|e| CommError::Bind {
                endpoint: local.to_string(),
                source: e,
            })?;
        let addr = listener.local_addr()?;
        let local = Endpoint::new(local.host.clone(), addr.port());

        let (inbound_tx, inbound_rx) = mpsc::channel(CommConfig::INBOUND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(Self::accept_loop(listener, inbound_tx, shutdown_rx));

        Ok(Self {
            local,
            inbound: Mutex::new(inbound_rx),
            outbound: Mutex::new(HashMap::new()),
            shutdown_tx,
            accept_task,
        })
    }

    /// The endpoint this transport is listening on.
    pub fn local(&self) -> &Endpoint {
        &self.local
    }

    /// Next inbound message. `None` once the transport has shut down.
    pub async fn recv(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }

    /// Send `message` to the endpoint named in its `to` key. Blocks only
    /// for the write itself, never for a response.
    pub async fn post(&self, message: Message) -> Result<()> {
        let dest = message
            .recipient()
            .ok_or_else(|| CommError::Validation {
                field: keys::TO.to_string(),
                message: "message has no destination".to_string(),
            })?
            .to_string();
        let payload = message.to_bytes()?;

        let mut outbound = self.outbound.lock().await;
        let write_result = {
            let stream = match outbound.entry(dest.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Self::connect(&dest).await?),
            };
            write_frame(stream, &payload).await
        };

        if let Err(e) = write_result {
            // Next post to this destination reconnects.
            outbound.remove(&dest);
            return Err(CommError::Send {
                endpoint: dest,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    /// Stop accepting connections and close the inbound queue. Pending
    /// `recv` calls return `None` once in-flight readers have drained.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn connect(dest: &str) -> Result<TcpStream> {
        let endpoint: Endpoint = dest.parse()?;
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        match tokio::time::timeout(CommConfig::CONNECT_TIMEOUT, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(CommError::Connect {
                endpoint: dest.to_string(),
                source: e,
            }),
            Err(_) => Err(CommError::Connect {
                endpoint: dest.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            }),
        }
    }

    async fn accept_loop(
        listener: TcpListener,
        inbound_tx: mpsc::Sender<Message>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    debug!("transport accept loop shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let tx = inbound_tx.clone();
                            let mut conn_shutdown = shutdown_rx.clone();
                            tokio::spawn(async move {
                                debug!(%peer, "inbound connection");
                                if let Err(e) =
                                    Self::read_connection(stream, tx, &mut conn_shutdown).await
                                {
                                    debug!(%peer, error = %e, "inbound connection ended");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }
    }

    async fn read_connection(
        mut stream: TcpStream,
        inbound_tx: mpsc::Sender<Message>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut reader, _) = stream.split();
        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(frame) => frame,
                        None => return Ok(()), // clean disconnect
                    }
                }
                _ = shutdown_rx.changed() => return Ok(()),
            };

            match Message::from_bytes(&frame) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        return Ok(()); // consumer gone
                    }
                }
                Err(e) => warn!(error = %e, "discarding undecodable frame"),
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
        self.accept_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> Endpoint {
        Endpoint::new("127.0.0.1", 0)
    }

    #[tokio::test]
    async fn test_bind_reports_actual_port() {
        let transport = Transport::bind(&loopback()).await.unwrap();
        assert_ne!(transport.local().port, 0);
    }

    #[tokio::test]
    async fn test_post_and_recv_roundtrip() {
        let receiver = Transport::bind(&loopback()).await.unwrap();
        let sender = Transport::bind(&loopback()).await.unwrap();

        let mut message = Message::new();
        message.set_recipient(receiver.local());
        message.set_sender(sender.local());
        message.set_command("ping");
        sender.post(message.clone()).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_posts_to_same_destination_reuse_one_connection() {
        let receiver = Transport::bind(&loopback()).await.unwrap();
        let sender = Transport::bind(&loopback()).await.unwrap();

        for i in 0..3 {
            let mut message = Message::new();
            message.set_recipient(receiver.local());
            message.insert("seq", i.to_string());
            sender.post(message).await.unwrap();
        }
        for i in 0..3 {
            let received = receiver.recv().await.unwrap();
            assert_eq!(received.get("seq"), Some(i.to_string().as_str()));
        }
        assert_eq!(sender.outbound.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_post_without_destination_fails() {
        let sender = Transport::bind(&loopback()).await.unwrap();
        let result = sender.post(Message::new()).await;
        assert!(matches!(result, Err(CommError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_post_to_dead_endpoint_fails() {
        let sender = Transport::bind(&loopback()).await.unwrap();
        let mut message = Message::new();
        // Port 1 is never listening.
        message.insert(keys::TO, "127.0.0.1:1");
        let result = sender.post(message).await;
        assert!(matches!(result, Err(CommError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_shutdown() {
        let transport = Transport::bind(&loopback()).await.unwrap();
        transport.shutdown();
        assert!(transport.recv().await.is_none());
    }
}
