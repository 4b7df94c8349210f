//! Cross-thread text access for background parsing.
//!
//! The document lives on its owning thread. A parser running elsewhere reads through a
//! [`BridgedReader`], which forwards each read as a [`ReadRequest`] and blocks until the owning
//! thread answers it from [`ReadBridgeHost::serve_pending`] (or any other loop draining
//! [`ReadBridgeHost::receiver`]).
//!
//! Every request carries the ticket of the edit being parsed. Once the clock moves past it the
//! read is refused, so a superseded parse aborts at its next read instead of finishing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use tracing::warn;

use crate::edit::TextPoint;
use crate::syntax::backend::TextReader;
use crate::syntax::clock::{EditClock, EditTicket};

/// What a [`ReadRequest`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    /// Document length in parser bytes.
    Len,
    /// A UTF-16 chunk.
    Utf16 {
        /// Start offset in parser bytes.
        byte_offset: usize,
        /// Maximum chunk length in UTF-16 units.
        max_units: usize,
    },
    /// Row/column of a byte offset.
    Point {
        /// Offset in parser bytes.
        byte_offset: usize,
    },
}

/// Answer to a [`ReadRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadReply {
    /// Answer to [`ReadKind::Len`].
    Len(usize),
    /// Answer to [`ReadKind::Utf16`].
    Utf16(Vec<u16>),
    /// Answer to [`ReadKind::Point`].
    Point(TextPoint),
    /// The ticket went stale or the text could not be read.
    Unavailable,
}

/// A read waiting to be answered on the owning thread.
#[derive(Debug)]
pub struct ReadRequest {
    ticket: EditTicket,
    kind: ReadKind,
    reply: Sender<ReadReply>,
}

impl ReadRequest {
    /// Ticket of the edit the read belongs to.
    pub fn ticket(&self) -> EditTicket {
        self.ticket
    }

    /// What is being read.
    pub fn kind(&self) -> ReadKind {
        self.kind
    }

    /// Answer the request from `reader`, refusing it if `clock` has moved past its ticket.
    pub fn serve(self, clock: &EditClock, reader: &dyn TextReader) {
        let reply = if clock.is_stale(self.ticket) {
            ReadReply::Unavailable
        } else {
            match self.kind {
                ReadKind::Len => ReadReply::Len(reader.len_bytes()),
                ReadKind::Utf16 {
                    byte_offset,
                    max_units,
                } => reader
                    .read_utf16(byte_offset, max_units)
                    .map_or(ReadReply::Unavailable, ReadReply::Utf16),
                ReadKind::Point { byte_offset } => reader
                    .point_at(byte_offset)
                    .map_or(ReadReply::Unavailable, ReadReply::Point),
            }
        };
        // The requester may have given up already.
        let _ = self.reply.send(reply);
    }
}

/// The owning thread's end of a read bridge.
#[derive(Debug)]
pub struct ReadBridgeHost {
    requests: Receiver<ReadRequest>,
    clock: EditClock,
}

impl ReadBridgeHost {
    /// Incoming requests, for use in a `select!` loop.
    pub fn receiver(&self) -> &Receiver<ReadRequest> {
        &self.requests
    }

    /// The clock requests are checked against.
    pub fn clock(&self) -> &EditClock {
        &self.clock
    }

    /// Answer one request.
    pub fn serve(&self, request: ReadRequest, reader: &dyn TextReader) {
        request.serve(&self.clock, reader);
    }

    /// Answer every request currently queued. Returns how many were served.
    pub fn serve_pending(&self, reader: &dyn TextReader) -> usize {
        let mut served = 0;
        while let Ok(request) = self.requests.try_recv() {
            request.serve(&self.clock, reader);
            served += 1;
        }
        served
    }
}

/// The parsing thread's end of a read bridge.
#[derive(Debug)]
pub struct BridgedReader {
    requests: Sender<ReadRequest>,
    /// Held for a whole round trip so reads from one parse never interleave.
    round_trip: Mutex<()>,
    clock: EditClock,
    ticket: AtomicU64,
    owner: ThreadId,
}

/// Create a read bridge whose host side belongs to the calling thread.
pub fn read_bridge(clock: EditClock) -> (ReadBridgeHost, BridgedReader) {
    let (tx, rx) = unbounded();
    let host = ReadBridgeHost {
        requests: rx,
        clock: clock.clone(),
    };
    let reader = BridgedReader {
        requests: tx,
        round_trip: Mutex::new(()),
        ticket: AtomicU64::new(clock.current().get()),
        clock,
        owner: thread::current().id(),
    };
    (host, reader)
}

impl BridgedReader {
    /// Tag subsequent reads with `ticket`.
    pub fn begin(&self, ticket: EditTicket) {
        self.ticket.store(ticket.get(), Ordering::Release);
    }

    /// The ticket reads are currently tagged with.
    pub fn ticket(&self) -> EditTicket {
        EditTicket::from_raw(self.ticket.load(Ordering::Acquire))
    }

    fn request(&self, kind: ReadKind) -> Option<ReadReply> {
        if thread::current().id() == self.owner {
            // Nobody would be left to answer.
            warn!("bridged read attempted on the owning thread");
            return None;
        }
        let ticket = self.ticket();
        if self.clock.is_stale(ticket) {
            return None;
        }

        let _guard = self.round_trip.lock().unwrap_or_else(PoisonError::into_inner);
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(ReadRequest {
                ticket,
                kind,
                reply: reply_tx,
            })
            .ok()?;
        match reply_rx.recv().ok()? {
            ReadReply::Unavailable => None,
            reply => Some(reply),
        }
    }
}

impl TextReader for BridgedReader {
    fn len_bytes(&self) -> usize {
        match self.request(ReadKind::Len) {
            Some(ReadReply::Len(len)) => len,
            _ => 0,
        }
    }

    fn read_utf16(&self, byte_offset: usize, max_units: usize) -> Option<Vec<u16>> {
        match self.request(ReadKind::Utf16 {
            byte_offset,
            max_units,
        })? {
            ReadReply::Utf16(units) => Some(units),
            _ => None,
        }
    }

    fn point_at(&self, byte_offset: usize) -> Option<TextPoint> {
        match self.request(ReadKind::Point { byte_offset })? {
            ReadReply::Point(point) => Some(point),
            _ => None,
        }
    }
}
