use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::warn;

use crate::config::Settings;
use crate::library::TrackRegistry;

use super::thread::spawn_engine_thread;
use super::types::{EngineCmd, EngineMsg, EngineState, StateHandle};

/// Handle to the engine for the front-end.
///
/// Commands go in through `send`; state comes out through the shared
/// `StateHandle`. Dropping the player shuts the engine down.
pub struct AudioPlayer {
    tx: Sender<EngineMsg>,
    state: StateHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    pub fn new(registry: TrackRegistry, settings: &Settings) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<EngineMsg>();
        let state: StateHandle = Arc::new(Mutex::new(EngineState::default()));

        let handle = spawn_engine_thread(
            registry,
            settings.clone(),
            tx.clone(),
            rx,
            state.clone(),
        )?;

        Ok(Self {
            tx,
            state,
            join: Mutex::new(Some(handle)),
        })
    }

    /// Copy of the current engine state.
    pub fn snapshot(&self) -> EngineState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn send(&self, cmd: EngineCmd) -> Result<(), mpsc::SendError<EngineMsg>> {
        self.tx.send(EngineMsg::Command(cmd))
    }

    /// Dispose the engine and wait for its thread. Idempotent.
    pub fn shutdown(&self) {
        let Ok(mut join) = self.join.lock() else {
            return;
        };
        let Some(handle) = join.take() else {
            return;
        };
        let _ = self.send(EngineCmd::Quit);
        if handle.join().is_err() {
            warn!("engine thread panicked");
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
