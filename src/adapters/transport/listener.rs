//! Inbound TCP listener
//!
//! One task per connection. Messages on a connection are handled one at a
//! time, so a partner's messages are acknowledged in the order they arrive.

use super::mllp::{read_frame, FrameCodec, Framing};
use crate::config::ListenerConfig;
use crate::core::intake::IntakeService;
use crate::domain::TransportError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Accepts partner connections and answers every message with an ACK
pub struct MllpListener {
    listener: TcpListener,
    intake: Arc<IntakeService>,
    codec: FrameCodec,
    read_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl MllpListener {
    /// Binds to `config.bind_address`
    pub async fn bind(config: &ListenerConfig, intake: IntakeService) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| TransportError::Connect {
                endpoint: config.bind_address.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            listener,
            intake: Arc::new(intake),
            codec: FrameCodec::new(config.framing),
            read_timeout: Duration::from_secs(config.read_timeout_seconds),
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` turns true
    ///
    /// Open connections finish the message in progress before closing.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        let address = self.local_addr()?;
        tracing::info!(
            address = %address,
            framing = %self.codec.framing(),
            "Listener started"
        );

        let mut connections = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            tracing::debug!(peer = %peer, "Connection accepted");
            let connection = Connection {
                intake: Arc::clone(&self.intake),
                codec: self.codec,
                read_timeout: self.read_timeout,
                peer,
            };
            let shutdown = shutdown.clone();
            connections.spawn(async move {
                connection.serve(stream, shutdown).await;
                drop(permit);
            });

            // reap finished connections
            while connections.try_join_next().is_some() {}
        }

        tracing::info!(open = connections.len(), "Listener stopping");
        while connections.join_next().await.is_some() {}
        tracing::info!("Listener stopped");
        Ok(())
    }
}

struct Connection {
    intake: Arc<IntakeService>,
    codec: FrameCodec,
    read_timeout: Duration,
    peer: SocketAddr,
}

impl Connection {
    async fn serve(self, mut stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
        let mut buf = Vec::new();

        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(
                    self.read_timeout,
                    read_frame(&mut stream, &self.codec, &mut buf),
                ) => next,
                _ = shutdown.changed() => break,
            };

            let raw = match next {
                Ok(Ok(Some(raw))) => raw,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    tracing::warn!(peer = %self.peer, error = %e, "Dropping connection");
                    break;
                }
                Err(_) => {
                    tracing::debug!(peer = %self.peer, "Connection idle, closing");
                    break;
                }
            };

            let outcome = self.intake.receive(&raw).await;
            if let Err(e) = stream.write_all(&self.codec.encode(&outcome.ack_text)).await {
                tracing::warn!(peer = %self.peer, error = %e, "Failed to write acknowledgment");
                break;
            }

            if self.codec.framing() == Framing::Raw {
                break;
            }
        }

        let _ = stream.shutdown().await;
        tracing::debug!(peer = %self.peer, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::NoopAuditSink;
    use crate::adapters::transport::{MllpTransport, Transport};
    use crate::core::dispatcher::Dispatcher;
    use crate::core::registry::{AcceptingHandler, RegistryBuilder};
    use crate::domain::MessageKey;
    use crate::hl7::ack::{ack_code_of, acknowledged_control_id};
    use crate::hl7::{parse, AckCode};

    async fn start(framing: Framing) -> (SocketAddr, watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let registry = RegistryBuilder::new()
            .with_standard_templates()
            .handler(MessageKey::ADT_A01, AcceptingHandler)
            .build();
        let intake = IntakeService::new(Dispatcher::new(Arc::new(registry)), Arc::new(NoopAuditSink));
        let config = ListenerConfig {
            enabled: true,
            bind_address: "127.0.0.1:0".to_string(),
            framing,
            max_connections: 4,
            read_timeout_seconds: 5,
        };
        let listener = MllpListener::bind(&config, intake).await.unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            listener.run(rx).await.unwrap();
        });
        (address, tx, handle)
    }

    fn message(control_id: &str, kind: &str) -> String {
        format!("MSH|^~\\&|EHR|WARD|ERP|HOSP|20240101120000||{kind}|{control_id}|P|2.5\rPID|1||P001\r")
    }

    #[tokio::test]
    async fn test_round_trip_over_mllp() {
        let (address, shutdown, handle) = start(Framing::Mllp).await;
        let transport = MllpTransport::new(Framing::Mllp, Duration::from_secs(5));

        let reply = transport
            .send(&message("MSG1", "ADT^A01"), &format!("tcp://{address}"))
            .await
            .unwrap()
            .unwrap();
        let ack = parse(&reply).unwrap();
        assert_eq!(ack_code_of(&ack), Some(AckCode::ApplicationAccept));
        assert_eq!(acknowledged_control_id(&ack), Some("MSG1"));

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_messages_on_one_connection_acknowledged_in_order() {
        let (address, shutdown, handle) = start(Framing::Mllp).await;
        let codec = FrameCodec::new(Framing::Mllp);
        let mut stream = TcpStream::connect(address).await.unwrap();

        let mut bytes = codec.encode(&message("A1", "ADT^A01"));
        bytes.extend(codec.encode(&message("A2", "ZZZ^Z01")));
        bytes.extend(codec.encode("garbage"));
        stream.write_all(&bytes).await.unwrap();

        let mut buf = Vec::new();
        let mut codes = Vec::new();
        for _ in 0..3 {
            let reply = read_frame(&mut stream, &codec, &mut buf).await.unwrap().unwrap();
            let ack = parse(&reply).unwrap();
            codes.push((
                ack_code_of(&ack).unwrap(),
                acknowledged_control_id(&ack).unwrap_or_default().to_string(),
            ));
        }
        assert_eq!(
            codes,
            vec![
                (AckCode::ApplicationAccept, "A1".to_string()),
                (AckCode::ApplicationError, "A2".to_string()),
                (AckCode::ApplicationReject, String::new()),
            ]
        );

        drop(stream);
        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_raw_framing_one_message_per_connection() {
        let (address, shutdown, handle) = start(Framing::Raw).await;
        let transport = MllpTransport::new(Framing::Raw, Duration::from_secs(5));

        let reply = transport
            .send(&message("RAW1", "ADT^A01"), &address.to_string())
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("MSA|AA|RAW1"));

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }
}
