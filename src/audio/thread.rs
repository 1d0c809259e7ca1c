use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Settings;
use crate::library::TrackRegistry;

use super::controller::Controller;
use super::loader::ThreadLoader;
use super::types::{EngineCmd, EngineMsg, StateHandle};

/// Spawn the engine thread.
///
/// The thread owns the controller (and through it the output device). It
/// wakes on every message and at least every `audio.poll_ms` to run
/// retries, end-of-track detection and progress sampling.
pub(super) fn spawn_engine_thread(
    registry: TrackRegistry,
    settings: Settings,
    tx: Sender<EngineMsg>,
    rx: Receiver<EngineMsg>,
    state: StateHandle,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("vesper-engine".to_string())
        .spawn(move || {
            let poll = Duration::from_millis(settings.audio.poll_ms.max(1));
            let loader = ThreadLoader::new(
                tx,
                Duration::from_millis(settings.audio.fetch_timeout_ms),
            );
            let mut ctl = Controller::new(registry, &settings, loader, state);
            info!(poll_ms = poll.as_millis() as u64, "engine thread started");

            loop {
                match rx.recv_timeout(poll) {
                    Ok(EngineMsg::Command(EngineCmd::Quit)) => {
                        ctl.handle_command(EngineCmd::Quit, Instant::now());
                        break;
                    }
                    Ok(EngineMsg::Command(cmd)) => ctl.handle_command(cmd, Instant::now()),
                    Ok(EngineMsg::Event(ev)) => ctl.handle_event(ev, Instant::now()),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("engine channel closed");
                        ctl.dispose();
                        break;
                    }
                }
                ctl.tick(Instant::now());
            }
            info!("engine thread stopped");
        })
}
