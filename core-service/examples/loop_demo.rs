//! # Gapless Loop Example
//!
//! Loops a simulated three-second track, prints every event for ten seconds,
//! then shuts the service down.
//!
//! Run with: `cargo run --example loop_demo --package core-service`

use bridge_desktop::{SimulatedConfig, SimulatedDecoderFactory};
use bridge_traits::decoder::AudioSource;
use bridge_traits::log::LogLevel;
use core_playback::{ControllerConfig, Endpoint, LoopMode, Track, TrackOptions};
use core_runtime::{init_logging, CoreConfig, LogFormat, LoggingConfig};
use core_service::PlaybackService;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let factory = SimulatedDecoderFactory::new(
        SimulatedConfig::default().with_duration(Duration::from_secs(3)),
    );
    let core = CoreConfig::builder()
        .decoder_factory(Arc::new(factory))
        .build()?;
    let player = PlaybackService::new(core)
        .with_controller_config(ControllerConfig::responsive())
        .spawn()?;

    let mut events = player.subscribe_audio("rain");
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("{}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    let track = Track::new(
        "rain",
        AudioSource::Uri {
            uri: "asset:///rain.ogg".to_string(),
        },
    )
    .with_options(TrackOptions::looping(LoopMode::Repeat));
    player.load(track).await?;
    player.set_volume("rain", 0.5).await?;
    player.play("rain", true, Endpoint::PlayToEnd).await?;

    tokio::time::sleep(Duration::from_secs(10)).await;
    player.shutdown().await?;
    printer.abort();
    Ok(())
}
