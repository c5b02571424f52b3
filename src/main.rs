use anyhow::{anyhow, Context, Result};
use deskpal::audio;
use deskpal::integration::{AppConfig, Assistant};
use deskpal::llm::OpenAiChatClient;
use deskpal::speech::{LazyRecognizer, VolcengineSynthesizer};
use deskpal::ui::{AppState, DeskpalApp};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskpal=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Deskpal");

    let config = AppConfig::load().context("Failed to load configuration")?;
    for key in config.missing_credentials() {
        warn!("{} is not set, requests that need it will fail", key);
    }

    let assistant = Arc::new(build_assistant(&config)?);
    let state = AppState::new(assistant, &config.dispatch, &config.ui)
        .context("Failed to start worker pool")?;

    let mut viewport = egui::ViewportBuilder::default()
        .with_title(&config.ui.title)
        .with_inner_size([config.ui.width, config.ui.height])
        .with_min_inner_size([320.0, 400.0]);
    if config.ui.always_on_top {
        viewport = viewport.with_always_on_top();
    }
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let ui_config = config.ui.clone();
    eframe::run_native(
        &config.ui.title,
        options,
        Box::new(move |cc| Ok(Box::new(DeskpalApp::new(cc, state, ui_config)))),
    )
    .map_err(|e| anyhow!("Window failed: {}", e))?;

    Ok(())
}

fn build_assistant(config: &AppConfig) -> Result<Assistant> {
    let chat = OpenAiChatClient::new(&config.chat)?;
    let synthesizer = VolcengineSynthesizer::new(config.synthesis.clone())?;

    if !audio::DEVICE_SUPPORT {
        warn!("Built without the `audio-io` feature, voice interactions will report a device error");
    }
    let (capture, playback) = audio::default_devices();

    let assistant = Assistant::builder()
        .with_config(config)
        .chat(Arc::new(chat))
        .recognizer(LazyRecognizer::new(config.recognition.factory()))
        .synthesizer(Arc::new(synthesizer))
        .capture(capture)
        .playback(playback)
        .build()?;
    Ok(assistant)
}
