//! Background parsing.
//!
//! [`SyntaxWorker`] moves a [`LanguageLayerSet`] onto its own thread. Edits are queued to it in
//! the order they were issued and applied in that order; only reparsing may be skipped when a
//! newer edit is already queued. The worker reads text through a [`BridgedReader`], so the owning
//! thread must keep answering reads: [`SyntaxSession::poll`] and [`SyntaxSession::wait`] both do.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, warn};

use crate::edit::{ByteRange, InputEdit};
use crate::error::SyntaxError;
use crate::ranges::{RangeEdit, shift_range};
use crate::syntax::backend::{GrammarRegistry, TextReader, TreeOf};
use crate::syntax::clock::{EditClock, EditTicket};
use crate::syntax::layer_set::{LanguageLayerSet, LayerSetSnapshot};
use crate::syntax::read_bridge::{ReadBridgeHost, read_bridge};
use crate::syntax::{SyntaxInvalidation, SyntaxSession, SyntaxUpdate};

const THREAD_NAME: &str = "editkit-syntax";

enum SyntaxJob {
    ParseAll(EditTicket),
    Edit(InputEdit, EditTicket),
}

type SharedSnapshot<R> = Arc<Mutex<Option<LayerSetSnapshot<TreeOf<R>>>>>;

/// The newest ticket whose result reached the document, stored as `ticket + 1` (0 for none).
///
/// A result is delivered before any later edit is issued or never, so when the worker starts
/// an edit job this tells it whether the previous result was seen.
#[derive(Debug, Clone, Default)]
struct Delivered(Arc<AtomicU64>);

impl Delivered {
    fn record(&self, ticket: EditTicket) {
        self.0.fetch_max(ticket.get() + 1, Ordering::AcqRel);
    }

    fn includes(&self, ticket: EditTicket) -> bool {
        self.0.load(Ordering::Acquire) > ticket.get()
    }
}

/// A [`LanguageLayerSet`] running on a background thread.
pub struct SyntaxWorker<R: GrammarRegistry> {
    jobs: Option<Sender<SyntaxJob>>,
    updates: Receiver<SyntaxUpdate>,
    host: Option<ReadBridgeHost>,
    handle: Option<JoinHandle<LanguageLayerSet<R>>>,
    snapshot: SharedSnapshot<R>,
    clock: EditClock,
    delivered: Delivered,
    in_flight: usize,
}

impl<R: GrammarRegistry> SyntaxWorker<R> {
    /// Start a worker thread for `layers`.
    ///
    /// The calling thread becomes the owning thread: it is the one expected to serve reads.
    pub fn spawn(layers: LanguageLayerSet<R>) -> Result<Self, SyntaxError> {
        let clock = layers.clock().clone();
        let (host, reader) = read_bridge(clock.clone());
        let (jobs_tx, jobs_rx) = unbounded::<SyntaxJob>();
        let (updates_tx, updates_rx) = unbounded();
        let snapshot: SharedSnapshot<R> = Arc::new(Mutex::new(None));
        let published = Arc::clone(&snapshot);
        let delivered = Delivered::default();
        let seen = delivered.clone();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut layers = layers;
                // The last result sent; the owner discards it if an edit overtook it.
                let mut reported: Option<(EditTicket, Vec<ByteRange>)> = None;

                for job in jobs_rx.iter() {
                    let (ticket, invalidation) = match job {
                        SyntaxJob::ParseAll(ticket) => {
                            reader.begin(ticket);
                            reported = None;
                            (ticket, SyntaxSession::parse_all(&mut layers, ticket, &reader))
                        }
                        SyntaxJob::Edit(edit, ticket) => {
                            reader.begin(ticket);
                            if let Some((last, ranges)) = reported.take()
                                && !seen.includes(last)
                            {
                                let range_edit = RangeEdit::from(&edit);
                                layers.carry_invalidation(
                                    ranges.into_iter().map(|range| shift_range(range, range_edit)),
                                );
                            }
                            (ticket, layers.apply_edit(&edit, ticket, &reader))
                        }
                    };
                    if let SyntaxInvalidation::Ranges { ranges, .. } = &invalidation {
                        reported = Some((ticket, ranges.clone()));
                    }

                    *published.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(layers.snapshot());
                    if updates_tx.send(SyntaxUpdate { ticket, invalidation }).is_err() {
                        break;
                    }
                }
                debug!("syntax worker stopped");
                layers
            })
            .map_err(|error| SyntaxError::Worker(error.to_string()))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            updates: updates_rx,
            host: Some(host),
            handle: Some(handle),
            snapshot,
            clock,
            delivered,
            in_flight: 0,
        })
    }

    /// The snapshot published after the most recently finished job.
    pub fn snapshot(&self) -> Option<LayerSetSnapshot<TreeOf<R>>> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Jobs sent but not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Stop the worker and take the layer set back.
    ///
    /// Queued jobs still run first, but their reads fail, so their parses abort.
    pub fn shutdown(mut self) -> Option<LanguageLayerSet<R>> {
        self.stop()
    }

    fn stop(&mut self) -> Option<LanguageLayerSet<R>> {
        self.jobs.take();
        self.host.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(layers) => Some(layers),
            Err(_) => {
                warn!("syntax worker panicked");
                None
            }
        }
    }

    fn send(&mut self, job: SyntaxJob) -> SyntaxInvalidation {
        let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if sent {
            self.in_flight += 1;
        } else {
            warn!("syntax worker is gone, dropping job");
        }
        SyntaxInvalidation::Deferred
    }

    fn received(&mut self, update: SyntaxUpdate) -> SyntaxUpdate {
        self.in_flight = self.in_flight.saturating_sub(1);
        // Same rule the document applies before notifying subscribers.
        if !update.invalidation.is_deferred() && !self.clock.is_stale(update.ticket) {
            self.delivered.record(update.ticket);
        }
        update
    }
}

impl<R: GrammarRegistry> SyntaxSession for SyntaxWorker<R> {
    fn parse_all(&mut self, ticket: EditTicket, _reader: &dyn TextReader) -> SyntaxInvalidation {
        self.send(SyntaxJob::ParseAll(ticket))
    }

    fn apply_edit(
        &mut self,
        edit: &InputEdit,
        ticket: EditTicket,
        _reader: &dyn TextReader,
    ) -> SyntaxInvalidation {
        debug_assert_eq!(ticket, self.clock.current());
        self.send(SyntaxJob::Edit(edit.clone(), ticket))
    }

    fn poll(&mut self, reader: &dyn TextReader) -> Vec<SyntaxUpdate> {
        if let Some(host) = &self.host {
            host.serve_pending(reader);
        }
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(self.received(update));
        }
        updates
    }

    fn wait(&mut self, reader: &dyn TextReader) -> Option<SyntaxUpdate> {
        if self.in_flight == 0 {
            return None;
        }
        let requests = self.host.as_ref()?.receiver().clone();
        let updates = self.updates.clone();
        loop {
            select! {
                recv(requests) -> request => match request {
                    Ok(request) => request.serve(&self.clock, reader),
                    Err(_) => {
                        // The worker dropped its reader: it has exited.
                        let update = updates.recv().ok();
                        return match update {
                            Some(update) => Some(self.received(update)),
                            None => {
                                self.in_flight = 0;
                                None
                            }
                        };
                    }
                },
                recv(updates) -> update => {
                    return match update {
                        Ok(update) => Some(self.received(update)),
                        Err(_) => {
                            self.in_flight = 0;
                            None
                        }
                    };
                }
            }
        }
    }
}

impl<R: GrammarRegistry> Drop for SyntaxWorker<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
