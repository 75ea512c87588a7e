use anyhow::{Result, anyhow};

mod app;
mod client;
mod config;
mod controller;
mod gemini;
mod handler;
mod state;
mod tui;
mod ui;

use app::App;
use config::Config;
use gemini::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    let api_key = config.resolved_api_key().ok_or_else(|| {
        anyhow!(
            "No API key found. Set {} or add \"api_key\" to {}",
            config::API_KEY_ENV,
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        )
    })?;

    let client = GeminiClient::new(
        &api_key,
        &config.resolved_model(),
        config.resolved_temperature(),
    );
    let mut app = App::new(client);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        // Subscribe before drawing so a publication between draw and sleep
        // still wakes the loop.
        let mut state_rx = app.state_rx.clone();

        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => handler::handle_event(app, event).await?,
                    None => break,
                }
            }
            changed = state_rx.changed() => {
                // A state change alone triggers the redraw at the top of
                // the loop; a closed channel just stops waking us early.
                let _ = changed;
            }
        }
    }

    Ok(())
}
