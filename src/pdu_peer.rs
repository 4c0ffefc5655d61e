//! `PDUPeer`: one UNIX-domain stream socket wrapped with an outbound queue,
//! a growing inbound buffer, and a serialized stream of connection events.
//!
//! The original design dedicates three OS threads per peer (send, receive,
//! callback) specifically to keep write-back-pressure, blocking receive, and
//! callback re-entrancy isolated from one another. This codebase is fully
//! tokio-idiomatic, so the same three duties are kept as three cooperating
//! tokio tasks instead of three OS threads: the isolation property (a wedged
//! callback cannot stall a send, a slow send cannot stall a receive) holds
//! either way.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dusa_collection_utils::core::logger::LogLevel;
use dusa_collection_utils::log;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::Duration;

use crate::errors::EngineError;
use crate::pdu::Pdu;

/// Events a peer reports to its client callback, delivered strictly in
/// order and never concurrently with one another.
#[derive(Debug)]
pub enum PDUPeerEvent {
    Connected,
    Disconnected,
    ReceivedPDU(Pdu),
    SendError,
}

/// Tunable knobs for the inbound receive buffer, lifted out of hardcoded
/// literals into an explicit config value (the concrete defaults live in
/// [`crate::config::EngineConfig`]).
#[derive(Debug, Clone, Copy)]
pub struct BufferPolicy {
    pub initial: usize,
    pub step: usize,
    pub max: usize,
    pub send_deadline: Duration,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy {
            initial: 4096,
            step: 4096,
            max: 1 << 20,
            send_deadline: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub struct PeerCounters {
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub pdus_sent: AtomicU64,
    pub pdus_received: AtomicU64,
    pub send_errors: AtomicU64,
    pub disconnects: AtomicU64,
}

/// A wrapped socket with its own outbound queue and a serialized event
/// stream delivered to one callback.
pub struct PDUPeer {
    fd: RawFd,
    outbound: mpsc::UnboundedSender<Pdu>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    pub counters: Arc<PeerCounters>,
}

impl PDUPeer {
    /// Wraps `stream`, spawning the send, receive, and callback tasks.
    /// `on_event` is invoked from the callback task only, one event at a
    /// time, in arrival order.
    pub fn spawn<F>(stream: UnixStream, policy: BufferPolicy, on_event: F) -> Arc<Self>
    where
        F: Fn(PDUPeerEvent) + Send + Sync + 'static,
    {
        let fd = stream.as_raw_fd();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Pdu>();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PDUPeerEvent>();
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let counters = Arc::new(PeerCounters::default());

        let (mut read_half, mut write_half) = stream.into_split();

        // callback task: the only task that ever touches `on_event`.
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                on_event(event);
            }
        });

        let _ = event_tx.send(PDUPeerEvent::Connected);

        // send task
        {
            let closed = closed.clone();
            let counters = counters.clone();
            let event_tx = event_tx.clone();
            let send_deadline = policy.send_deadline;
            tokio::spawn(async move {
                while let Some(pdu) = outbound_rx.recv().await {
                    if closed.load(Ordering::SeqCst) {
                        break;
                    }
                    let bytes = pdu.encode();
                    let result = tokio::time::timeout(send_deadline, write_half.write_all(&bytes)).await;
                    match result {
                        Ok(Ok(())) => {
                            counters.bytes_sent.fetch_add(bytes.len() as u64, Ordering::SeqCst);
                            counters.pdus_sent.fetch_add(1, Ordering::SeqCst);
                        }
                        _ => {
                            counters.send_errors.fetch_add(1, Ordering::SeqCst);
                            let _ = event_tx.send(PDUPeerEvent::SendError);
                            break;
                        }
                    }
                }
                closed.store(true, Ordering::SeqCst);
            });
        }

        // receive task
        {
            let closed = closed.clone();
            let counters = counters.clone();
            let event_tx = event_tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut buf: Vec<u8> = Vec::with_capacity(policy.initial);
                let mut cap = policy.initial;
                let mut chunk = vec![0u8; 4096];

                'outer: loop {
                    tokio::select! {
                        _ = shutdown.notified() => break 'outer,
                        read_result = read_half.read(&mut chunk) => {
                            match read_result {
                                Ok(0) => break 'outer,
                                Ok(n) => {
                                    counters.bytes_received.fetch_add(n as u64, Ordering::SeqCst);
                                    buf.extend_from_slice(&chunk[..n]);

                                    loop {
                                        match Pdu::try_decode(&buf) {
                                            Ok(Some((pdu, consumed))) => {
                                                counters.pdus_received.fetch_add(1, Ordering::SeqCst);
                                                buf.drain(..consumed);
                                                let _ = event_tx.send(PDUPeerEvent::ReceivedPDU(pdu));
                                            }
                                            Ok(None) => {
                                                if buf.len() > cap {
                                                    if cap >= policy.max {
                                                        log!(LogLevel::Error, "peer {} receive buffer exceeded cap", fd);
                                                        break 'outer;
                                                    }
                                                    cap = (cap + policy.step).min(policy.max);
                                                }
                                                break;
                                            }
                                            Err(EngineError::PDUVersionInvalid) => {
                                                log!(LogLevel::Error, "peer {} sent an invalid PDU version", fd);
                                                break 'outer;
                                            }
                                            Err(_) => break 'outer,
                                        }
                                    }
                                }
                                Err(_) => break 'outer,
                            }
                        }
                    }
                }

                closed.store(true, Ordering::SeqCst);
                counters.disconnects.fetch_add(1, Ordering::SeqCst);
                let _ = event_tx.send(PDUPeerEvent::Disconnected);
            });
        }

        Arc::new(PDUPeer {
            fd,
            outbound: outbound_tx,
            closed,
            shutdown,
            counters,
        })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enqueues a PDU for the send task. Fails with
    /// [`EngineError::InvalidPeer`] once the peer has disconnected.
    pub fn send(&self, pdu: Pdu) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::InvalidPeer);
        }
        self.outbound.send(pdu).map_err(|_| EngineError::InvalidPeer)
    }

    /// Closes the peer: stops the receive task and lets the send task drain
    /// naturally (dropping the sender half once no more sends are queued).
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}
