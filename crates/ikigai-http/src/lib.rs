// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Non-blocking multi-transfer HTTP engine.
//!
//! Fans out any number of concurrently in-flight requests over a shared
//! [`reqwest::Client`].  Each transfer streams its response body back to the
//! owning event loop as [`TransferEvent::Chunk`]s followed by exactly one
//! [`TransferEvent::Completed`].  Events arrive in FIFO order on a single
//! queue, so the caller integrates the engine into its readiness loop by
//! awaiting [`MultiEngine::next_event`] (or draining without blocking via
//! [`MultiEngine::drain`]).
//!
//! The `mock://` scheme is a loopback: the request body is echoed back as
//! the response stream.  The mock provider uses this to exercise the entire
//! pipeline without a network.

use std::collections::HashSet;

use futures::StreamExt;
use ikigai_model::WireRequest;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifies one transfer from `add` through completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub u64);

/// Initial capacity of the per-transfer response buffer; it doubles on
/// growth as chunks accumulate.
const RESPONSE_BUF_INITIAL: usize = 4096;

/// Terminal outcome of a transfer.
///
/// Every variant carries the response body the transfer accumulated: the
/// full streamed body on success, the error payload otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success { status: u16, body: String },
    ClientError { status: u16, body: String },
    ServerError { status: u16, body: String },
    NetworkError { message: String },
}

#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// A piece of the response body, delivered in arrival order.
    Chunk { id: TransferId, bytes: Vec<u8> },
    /// Exactly one per transfer, after its last chunk.
    Completed { id: TransferId, outcome: Completion },
}

pub struct MultiEngine {
    client: reqwest::Client,
    tx: mpsc::UnboundedSender<TransferEvent>,
    rx: mpsc::UnboundedReceiver<TransferEvent>,
    next_id: u64,
    live: HashSet<TransferId>,
}

impl MultiEngine {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client: reqwest::Client::new(),
            tx,
            rx,
            next_id: 0,
            live: HashSet::new(),
        }
    }

    /// Enqueue a request and return immediately.
    ///
    /// The transfer runs on its own task; its chunks and completion surface
    /// through [`Self::next_event`] / [`Self::drain`].
    pub fn add(&mut self, wire: WireRequest) -> TransferId {
        let id = TransferId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);

        let tx = self.tx.clone();
        if wire.url.starts_with("mock://") {
            // Loopback: the request body is the response stream.
            let body = wire.body;
            tokio::spawn(async move {
                let _ = tx.send(TransferEvent::Chunk { id, bytes: body.clone().into_bytes() });
                let _ = tx.send(TransferEvent::Completed {
                    id,
                    outcome: Completion::Success { status: 200, body },
                });
            });
            return id;
        }

        let client = self.client.clone();
        tokio::spawn(async move {
            let outcome = run_transfer(&client, id, wire, &tx).await;
            // The receiver half only closes at teardown; a failed send means
            // nobody is listening anymore, which is fine.
            let _ = tx.send(TransferEvent::Completed { id, outcome });
        });
        id
    }

    /// Number of transfers whose completion has not yet been delivered.
    pub fn still_running(&self) -> usize {
        self.live.len()
    }

    /// Await the next transfer event.  Pending forever when no transfer is
    /// in flight, which makes it safe inside a `select!` arm.
    pub async fn next_event(&mut self) -> TransferEvent {
        loop {
            match self.rx.recv().await {
                Some(ev) => {
                    self.note(&ev);
                    return ev;
                }
                // All senders dropped cannot happen while self.tx is held.
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Deliver every event already queued, without blocking.
    pub fn drain(&mut self) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            self.note(&ev);
            events.push(ev);
        }
        events
    }

    fn note(&mut self, ev: &TransferEvent) {
        if let TransferEvent::Completed { id, .. } = ev {
            self.live.remove(id);
        }
    }
}

impl Default for MultiEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one HTTP transfer: send, stream the body, classify the outcome.
///
/// Each chunk is both forwarded to the owning event loop (where the SSE
/// parser consumes it) and appended to the transfer's own response buffer,
/// which is handed over with the completion.
async fn run_transfer(
    client: &reqwest::Client,
    id: TransferId,
    wire: WireRequest,
    tx: &mpsc::UnboundedSender<TransferEvent>,
) -> Completion {
    let mut req = client.post(&wire.url);
    for (name, value) in &wire.headers {
        req = req.header(name.as_str(), value.as_str());
    }
    let resp = match req.body(wire.body).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(transfer = id.0, error = %e, "transfer failed before response");
            return Completion::NetworkError { message: e.to_string() };
        }
    };

    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        // Error responses are small; buffer the body for classification.
        let body = resp.text().await.unwrap_or_default();
        return if (400..500).contains(&status) {
            Completion::ClientError { status, body }
        } else {
            Completion::ServerError { status, body }
        };
    }

    debug!(transfer = id.0, status, "response headers received, streaming body");

    let mut body = Vec::with_capacity(RESPONSE_BUF_INITIAL);
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                body.extend_from_slice(&bytes);
                let _ = tx.send(TransferEvent::Chunk { id, bytes: bytes.to_vec() });
            }
            Err(e) => {
                return Completion::NetworkError { message: e.to_string() };
            }
        }
    }
    Completion::Success {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
