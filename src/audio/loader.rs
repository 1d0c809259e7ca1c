//! Asynchronous stream loading.
//!
//! Each load runs on a short-lived thread that fetches the bytes, probes them
//! with the decoder and posts the outcome back into the engine channel. The
//! engine only ever sees the result as an `EngineEvent`.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, Source};
use tracing::{debug, warn};

use crate::error::{ErrorKind, PlaybackError};

use super::fetch::fetch_bytes;
use super::impulse::ImpulseResponse;
use super::types::{EngineEvent, EngineMsg};

/// A fetched and probed track, ready to be attached to the graph.
#[derive(Clone)]
pub struct LoadedStream {
    bytes: Arc<[u8]>,
    duration: Option<Duration>,
}

impl LoadedStream {
    pub fn new(bytes: Arc<[u8]>, duration: Option<Duration>) -> Self {
        Self { bytes, duration }
    }

    /// Fetch-independent probe: decode the header and read the duration.
    pub fn probe(bytes: Arc<[u8]>) -> Result<Self, PlaybackError> {
        if bytes.is_empty() {
            return Err(PlaybackError::new(ErrorKind::DecodeFailure, "empty stream"));
        }
        let decoder = Decoder::new(Cursor::new(bytes.clone()))
            .map_err(|e| PlaybackError::from_decoder(&e))?;
        let duration = decoder.total_duration();
        Ok(Self { bytes, duration })
    }

    /// Open a fresh decoder over the in-memory bytes.
    pub fn decoder(&self) -> Result<Decoder<Cursor<Arc<[u8]>>>, PlaybackError> {
        Decoder::new(Cursor::new(self.bytes.clone())).map_err(|e| PlaybackError::from_decoder(&e))
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }
}

impl fmt::Debug for LoadedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedStream")
            .field("bytes", &self.bytes.len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Cancellation flag shared between the engine and one loader thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One track load, tagged so late results can be told apart.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub index: usize,
    pub generation: u64,
    pub uri: String,
    pub cancel: CancelToken,
}

/// Where the controller sends its I/O.
pub trait StreamLoader {
    fn load(&mut self, request: LoadRequest);
    fn load_impulse(&mut self, uri: String);
}

/// Production loader: one thread per request, results posted to the engine channel.
pub struct ThreadLoader {
    tx: Sender<EngineMsg>,
    timeout: Duration,
}

impl ThreadLoader {
    pub fn new(tx: Sender<EngineMsg>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }
}

impl StreamLoader for ThreadLoader {
    fn load(&mut self, request: LoadRequest) {
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let (index, generation) = (request.index, request.generation);
        let spawned = thread::Builder::new()
            .name(format!("vesper-load-{generation}"))
            .spawn(move || {
                let LoadRequest {
                    index,
                    generation,
                    uri,
                    cancel,
                } = request;
                let outcome = fetch_bytes(&uri, timeout).and_then(|bytes| {
                    if cancel.is_cancelled() {
                        return Err(PlaybackError::aborted());
                    }
                    LoadedStream::probe(bytes)
                });
                let event = match outcome {
                    Ok(stream) => EngineEvent::StreamReady {
                        index,
                        generation,
                        stream,
                    },
                    Err(error) => EngineEvent::StreamFailed {
                        index,
                        generation,
                        error,
                    },
                };
                // The engine may already be gone; nothing to report to then.
                let _ = tx.send(EngineMsg::Event(event));
            });
        if let Err(e) = spawned {
            warn!("failed to spawn loader thread: {e}");
            let _ = self.tx.send(EngineMsg::Event(EngineEvent::StreamFailed {
                index,
                generation,
                error: PlaybackError::new(ErrorKind::Unknown, e.to_string()),
            }));
        }
    }

    fn load_impulse(&mut self, uri: String) {
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let spawned = thread::Builder::new()
            .name("vesper-impulse".to_string())
            .spawn(move || {
                debug!(uri = %uri, "loading impulse response");
                let outcome = fetch_bytes(&uri, timeout).and_then(ImpulseResponse::decode);
                let _ = tx.send(EngineMsg::Event(EngineEvent::ImpulseLoaded(outcome)));
            });
        if let Err(e) = spawned {
            warn!("failed to spawn impulse loader thread: {e}");
            let _ = self.tx.send(EngineMsg::Event(EngineEvent::ImpulseLoaded(Err(
                PlaybackError::new(ErrorKind::Unknown, e.to_string()),
            ))));
        }
    }
}
