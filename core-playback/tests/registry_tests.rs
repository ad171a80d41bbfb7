mod support;

use bridge_traits::decoder::DecoderSignal;
use core_async::scheduler::{ManualScheduler, Scheduler};
use core_playback::{
    AudioId, ControllerConfig, ControllerRegistry, Endpoint, LoopMode, PlaybackError,
    RegistryContext, TimerTask, TrackOptions,
};
use core_runtime::events::{EventSink, PlayerEvent};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use support::{ms, track, FakeBehavior, FakeFactory, Harness, SharedQueue, SignalQueue};

mock! {
    Sink {}
    impl EventSink for Sink {
        fn emit(&self, event: PlayerEvent);
    }
}

#[test]
fn test_duplicate_audio_id_is_rejected() {
    let mut h = Harness::new(FakeBehavior::default());
    h.load(track("rain", TrackOptions::default()));

    let err = h
        .registry
        .load(track("rain", TrackOptions::default()))
        .unwrap_err();

    assert!(matches!(err, PlaybackError::DuplicateAudioId(id) if id.as_str() == "rain"));
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.factory.created(), 1);
}

#[test]
fn test_released_key_goes_stale_after_slot_reuse() {
    let mut h = Harness::new(FakeBehavior::default());
    let old = h.load(track("rain", TrackOptions::default()));

    h.registry.release(&AudioId::from("rain")).unwrap();
    assert!(h.registry.get(old).is_none());
    assert!(!h.registry.contains(&"rain".into()));

    let new = h.load(track("wind", TrackOptions::default()));
    assert_eq!(new.index(), old.index());
    assert_ne!(new.generation(), old.generation());
    assert!(h.registry.get(old).is_none());
    assert_eq!(h.registry.get(new).unwrap().audio_id().as_str(), "wind");

    let decoder = h.controller("wind").active_decoder_id().unwrap();
    let delivered = h
        .registry
        .dispatch_signal(old, DecoderSignal::Completed { decoder });
    assert!(!delivered);
    assert_eq!(h.events.completions(), 0);
}

#[test]
fn test_unknown_audio_id() {
    let mut h = Harness::new(FakeBehavior::default());

    assert!(matches!(
        h.registry.controller(&"missing".into()),
        Err(PlaybackError::UnknownAudio(_))
    ));
    assert!(matches!(
        h.registry.release(&"missing".into()),
        Err(PlaybackError::UnknownAudio(_))
    ));
}

#[test]
fn test_commands_after_release_report_already_released() {
    let mut h = Harness::new(FakeBehavior::default());
    h.load(track("rain", TrackOptions::default()));
    let rain = AudioId::from("rain");

    h.registry.release(&rain).unwrap();

    assert!(h.registry.is_released(&rain));
    assert!(matches!(
        h.registry.release(&rain),
        Err(PlaybackError::AlreadyReleased(id)) if id == rain
    ));
    assert!(matches!(
        h.registry.controller_mut(&rain),
        Err(PlaybackError::AlreadyReleased(_))
    ));
    assert!(matches!(
        h.registry.controller(&"wind".into()),
        Err(PlaybackError::UnknownAudio(_))
    ));
    assert!(h.factory.probes().iter().all(|p| p.disposed() == 1));

    // Loading the id again clears the tombstone.
    h.load(track("rain", TrackOptions::default()));
    assert!(!h.registry.is_released(&rain));
    assert!(h.registry.controller(&rain).is_ok());
}

#[test]
fn test_release_all_disposes_every_decoder() {
    let mut h = Harness::new(FakeBehavior::default());
    h.load(track("rain", TrackOptions::looping(LoopMode::Repeat)));
    h.load(track("wind", TrackOptions::default()));
    h.load(track("birds", TrackOptions::looping(LoopMode::Seamless)));

    assert_eq!(h.registry.release_all(), 3);

    assert!(h.registry.is_empty());
    assert_eq!(h.factory.created(), 5);
    assert!(h.factory.probes().iter().all(|p| p.disposed() == 1));
    assert_eq!(h.clock.pending(), 0);
    assert_eq!(h.registry.release_all(), 0);
}

#[test]
fn test_create_failure_frees_the_slot() {
    let mut h = Harness::new(FakeBehavior::default());
    h.factory.set_fail_create(true);

    let err = h
        .registry
        .load(track("rain", TrackOptions::default()))
        .unwrap_err();
    assert!(matches!(err, PlaybackError::DecoderCreateFailed(_)));
    assert!(h.registry.is_empty());

    h.factory.set_fail_create(false);
    let key = h.load(track("rain", TrackOptions::default()));
    assert_eq!(key.index(), 0);
    assert_eq!(key.generation(), 1);
}

#[test]
fn test_dropping_registry_releases_controllers() {
    let mut h = Harness::new(FakeBehavior::default());
    h.load(track("rain", TrackOptions::looping(LoopMode::Repeat)));
    let factory = Arc::clone(&h.factory);
    let clock = Arc::clone(&h.clock);

    drop(h);

    assert_eq!(factory.created(), 2);
    assert!(factory.probes().iter().all(|p| p.disposed() == 1));
    assert_eq!(clock.pending(), 0);
}

#[test]
fn test_timers_after_release_emit_nothing() {
    let clock: support::Clock = Arc::new(ManualScheduler::new());
    let factory = Arc::new(FakeFactory::new(Arc::clone(&clock), FakeBehavior::default()));
    let signals = Arc::new(SignalQueue::default());
    let mut sink = MockSink::new();
    sink.expect_emit().never();

    let mut registry = ControllerRegistry::new(RegistryContext {
        decoder_factory: factory.clone(),
        scheduler: clock.clone(),
        events: Arc::new(sink),
        listeners: Arc::new(SharedQueue(signals)),
        config: ControllerConfig::default(),
    })
    .unwrap();

    let audio_id = AudioId::from("rain");
    registry
        .load(track("rain", TrackOptions::looping(LoopMode::Repeat)))
        .unwrap();
    registry
        .controller_mut(&audio_id)
        .unwrap()
        .play(false, Endpoint::at_millis(300))
        .unwrap();

    // Both timers fire and are posted, then the controller goes away
    // before the queue gets to them.
    let until = clock.now() + Duration::from_millis(400);
    let tick = clock.pop_due(until).unwrap();
    let endpoint = clock.pop_due(until).unwrap();
    assert!(matches!(tick.payload, TimerTask::PositionTick { .. }));
    assert!(matches!(endpoint.payload, TimerTask::Endpoint { .. }));

    registry.release(&audio_id).unwrap();

    assert!(!registry.dispatch_timer(tick));
    assert!(!registry.dispatch_timer(endpoint));
}

#[test]
fn test_invalid_config_is_rejected() {
    let clock: support::Clock = Arc::new(ManualScheduler::new());
    let result = ControllerRegistry::new(RegistryContext {
        decoder_factory: Arc::new(FakeFactory::new(Arc::clone(&clock), FakeBehavior::default())),
        scheduler: clock,
        events: Arc::new(MockSink::new()),
        listeners: Arc::new(SharedQueue(Arc::new(SignalQueue::default()))),
        config: ControllerConfig {
            poll_interval: ms(1),
            ..ControllerConfig::default()
        },
    });

    assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
}
