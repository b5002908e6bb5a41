//! Application entry point — SpeakFlow console client.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the chat transport from config.
//! 4. Create the controller event channel.
//! 5. Spawn the stdin capture thread and the simulated speech sink.
//! 6. Spawn the presenter, which prints the session from shared state.
//! 7. Start listening and run the turn controller until `/quit` or end of
//!    input.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};

use speakflow::{
    chat::{ChatTransport, HttpChatTransport},
    config::{AppConfig, AppPaths},
    console::{ConsoleCapture, ConsoleSink, Presenter},
    turn::{new_shared_state, ControllerEvent, TurnController},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("SpeakFlow starting up");

    // 2. Configuration
    log::debug!("config: {}", AppPaths::new().settings_file.display());
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Chat transport
    let transport: Arc<dyn ChatTransport> = Arc::new(HttpChatTransport::from_config(&config.chat));
    log::info!(
        "chat: {:?} endpoint at {}",
        config.chat.provider,
        config.chat.base_url
    );

    // 4. Channel setup
    let (events_tx, events_rx) = mpsc::channel::<ControllerEvent>(64);

    // 5. Devices
    let capture =
        ConsoleCapture::spawn(events_tx.clone()).context("failed to start console capture")?;
    let sink = ConsoleSink::new(events_tx.clone(), config.console.words_per_minute);

    // 6. Presenter
    let shared = new_shared_state();
    let (stop_tx, stop_rx) = oneshot::channel();
    let presenter = tokio::spawn(
        Presenter::new(config.console.show_timestamps).run(Arc::clone(&shared), stop_rx),
    );

    println!(
        "Type to talk; a pause of {:?} sends the message.",
        config.conversation.silence_threshold()
    );
    println!("Enter toggles the microphone; /start, /stop, /quit.");

    // 7. Run the controller
    let controller = TurnController::new(
        config.conversation.clone(),
        transport,
        Box::new(capture),
        Box::new(sink),
        shared,
    );
    events_tx
        .send(ControllerEvent::Start)
        .await
        .context("controller event channel closed")?;
    drop(events_tx);

    let outcome = controller.run(events_rx).await;

    let _ = stop_tx.send(());
    if let Err(e) = presenter.await {
        log::warn!("console: presenter task failed: {e}");
    }

    outcome.context("conversation session failed")?;
    log::info!("SpeakFlow exiting");
    Ok(())
}
