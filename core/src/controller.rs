//! Background fetch controller.
//!
//! # Design
//! Each `start` bumps a generation counter and spawns one worker thread that
//! runs build → send → format and posts `(generation, result)` on the
//! controller's channel. Results are only handed to the listener from
//! `poll`/`wait`, on the caller's thread, and only when they carry the
//! current generation while a fetch is outstanding. Superseded workers are
//! never interrupted; their results are simply dropped on arrival.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_ENDPOINT;
use crate::envelope::SoapRequestBuilder;
use crate::error::FetchError;
use crate::format::{DisplayMode, DisplayResult, ResponseFormatter};
use crate::transport::SoapTransport;

/// Receives controller events on the thread that drives the controller.
pub trait FetchListener {
    fn on_result(&mut self, generation: u64, result: DisplayResult);

    fn on_reset(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Loading { generation: u64 },
}

/// Everything a worker needs besides the transport and the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub endpoint: String,
    pub builder: SoapRequestBuilder,
    pub mode: DisplayMode,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            builder: SoapRequestBuilder::default(),
            mode: DisplayMode::default(),
        }
    }
}

struct Completion {
    generation: u64,
    result: DisplayResult,
}

pub struct AsyncFetchController<L: FetchListener> {
    transport: Arc<dyn SoapTransport>,
    settings: Arc<FetchSettings>,
    listener: L,
    generation: u64,
    state: FetchState,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl<L: FetchListener> AsyncFetchController<L> {
    pub fn new(transport: Arc<dyn SoapTransport>, settings: FetchSettings, listener: L) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            transport,
            settings: Arc::new(settings),
            listener,
            generation: 0,
            state: FetchState::Idle,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Start a fetch for `query`, superseding any outstanding one.
    /// Returns the new generation.
    pub fn start(&mut self, query: &str) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.state = FetchState::Loading { generation };
        tracing::debug!(generation, query, "Starting fetch");

        let transport = Arc::clone(&self.transport);
        let settings = Arc::clone(&self.settings);
        let tx = self.tx.clone();
        let query = query.to_string();

        let spawned = thread::Builder::new()
            .name(format!("cities-fetch-{generation}"))
            .spawn(move || {
                let result = run_fetch(transport.as_ref(), &settings, &query);
                // The controller may be gone already.
                let _ = tx.send(Completion { generation, result });
            });

        if let Err(err) = spawned {
            tracing::warn!(generation, error = %err, "Could not spawn fetch worker");
            let _ = self.tx.send(Completion {
                generation,
                result: ResponseFormatter::no_data(self.settings.mode),
            });
        }

        generation
    }

    /// Deliver any completed result without blocking. Returns true if the
    /// listener received a result.
    pub fn poll(&mut self) -> bool {
        let mut delivered = false;
        while let Ok(completion) = self.rx.try_recv() {
            delivered |= self.accept(completion);
        }
        delivered
    }

    /// Block until the outstanding fetch is delivered. Returns false
    /// immediately when idle.
    pub fn wait(&mut self) -> bool {
        while matches!(self.state, FetchState::Loading { .. }) {
            match self.rx.recv() {
                Ok(completion) => {
                    if self.accept(completion) {
                        return true;
                    }
                }
                Err(_) => break,
            }
        }
        false
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while matches!(self.state, FetchState::Loading { .. }) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if self.accept(completion) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        false
    }

    /// Drop the outstanding fetch, if any, and notify the listener.
    pub fn reset(&mut self) {
        self.generation += 1;
        if let FetchState::Loading { generation } = self.state {
            tracing::debug!(generation, "Discarding outstanding fetch");
        }
        self.state = FetchState::Idle;
        self.listener.on_reset();
    }

    fn accept(&mut self, completion: Completion) -> bool {
        match self.state {
            FetchState::Loading { generation } if generation == completion.generation => {
                self.state = FetchState::Idle;
                tracing::debug!(generation, no_data = completion.result.is_no_data(), "Delivering result");
                self.listener.on_result(generation, completion.result);
                true
            }
            _ => {
                tracing::debug!(
                    generation = completion.generation,
                    current = self.generation,
                    "Dropping stale result"
                );
                false
            }
        }
    }
}

/// Run one fetch to completion on the current thread.
///
/// Never fails: errors and panics are logged and turned into the no-data
/// result for the configured mode.
pub fn run_fetch(transport: &dyn SoapTransport, settings: &FetchSettings, query: &str) -> DisplayResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| fetch_display(transport, settings, query)));
    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(FetchError::EmptyInput)) => {
            tracing::debug!("Empty query, no request sent");
            ResponseFormatter::no_data(settings.mode)
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, endpoint = %settings.endpoint, "Fetch failed, showing no data");
            ResponseFormatter::no_data(settings.mode)
        }
        Err(_) => {
            tracing::error!("Fetch worker panicked, showing no data");
            ResponseFormatter::no_data(settings.mode)
        }
    }
}

fn fetch_display(
    transport: &dyn SoapTransport,
    settings: &FetchSettings,
    query: &str,
) -> Result<DisplayResult, FetchError> {
    let envelope = settings.builder.build(query)?;
    let raw = transport.send(&envelope, &settings.endpoint, &envelope.action())?;
    ResponseFormatter::format(settings.mode, raw.as_ref())
}
