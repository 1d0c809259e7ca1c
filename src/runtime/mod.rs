use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use crate::app::App;
use crate::error::Result;
use crate::audio::AudioPlayer;
use crate::library::load_playlist;

mod event_loop;
mod logging;
mod settings;
mod startup;

pub fn run() -> Result<()> {
    let settings = settings::load_settings();
    let log_file = logging::init_logging(&settings.logging);

    let playlist = startup::playlist_path(&settings)?;
    let registry = load_playlist(&playlist)?;
    info!(
        playlist = %playlist.display(),
        tracks = registry.count(),
        log = ?log_file,
        "starting vesper"
    );

    let audio_player = AudioPlayer::new(registry.clone(), &settings)?;
    let mut app = App::new(registry);
    startup::apply_playback_defaults(&mut app, &settings);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(&mut terminal, &settings, &mut app, &audio_player);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    audio_player.shutdown();
    if let Err(e) = &run_result {
        error!("terminal loop failed: {e}");
    }
    run_result?;
    Ok(())
}
