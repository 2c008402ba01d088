//! Integration tests for the avplayer-core player
//!
//! These tests drive the public `AvPlayer` surface end to end, with the
//! controller thread running:
//! - Source attachment, stream selection and playback
//! - Faults raised from other threads
//! - Buffering, auto-start and auto-play-next
//! - Event delivery through handlers and polling

use anyhow::Result;
use std::sync::{Arc, Weak};
use std::thread;

use avplayer_core::player::{EventData, EventId, EventReplacement, PlayerConfig, PlayerEvent};
use avplayer_core::utils::Config;
use avplayer_core::{AvPlayer, AvPlayerError, LanguageCode, LifecycleState, ScriptedOpener, SourceType, StreamDescriptor};
use avplayer_integration_tests::{feed, start_clip, wait_for_state, wait_until, TestFixture};
use parking_lot::Mutex;

#[test]
fn test_clip_plays_to_end_of_stream() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;

    player.add_source("clip.mp4", SourceType::File)?;
    assert_eq!(player.stream_count()?, 2);
    player.enable_stream(0)?;
    player.enable_stream(1)?;
    player.start()?;
    assert!(player.is_active());

    fixture.source()?.events().on_end_of_stream();
    assert!(wait_for_state(&player, LifecycleState::EndOfStream));
    assert!(!player.is_active());

    player.stop()?;
    assert_eq!(player.state(), LifecycleState::Stopped);
    Ok(())
}

#[test]
fn test_enable_out_of_range_stream() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    player.add_source("clip.mp4", SourceType::File)?;

    let err = player.enable_stream(5).unwrap_err();
    assert!(matches!(err, AvPlayerError::StreamIndexOutOfRange { index: 5, count: 2 }));
    assert!(err.is_validation());
    assert_eq!(player.state(), LifecycleState::SourceAttached);
    Ok(())
}

#[test]
fn test_stop_twice() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    player.stop()?;
    player.stop()?;
    assert_eq!(player.state(), LifecycleState::Stopped);
    assert_eq!(fixture.recorder.count(EventId::StateStop), 1);
    assert!(!fixture.source()?.is_running());
    Ok(())
}

#[test]
fn test_error_from_decode_thread_is_fatal() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    let events = fixture.source()?.events().clone();
    thread::spawn(move || events.on_error()).join().unwrap();

    assert!(wait_for_state(&player, LifecycleState::Error));
    assert!(matches!(player.start(), Err(AvPlayerError::InvalidState(LifecycleState::Error))));
    assert!(player.video_data().is_none());

    player.stop()?;
    assert_eq!(player.state(), LifecycleState::Error);
    Ok(())
}

#[test]
fn test_buffering_round_trip() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;
    let source = fixture.source()?;

    feed(&source, 0, 2);
    while player.video_data().is_some() {}
    assert!(wait_for_state(&player, LifecycleState::Buffering));
    assert!(fixture.recorder.wait_for(EventId::StateBuffering, 1));

    feed(&source, 80, 10);
    assert!(wait_for_state(&player, LifecycleState::Playing));
    assert!(fixture.recorder.wait_for(EventId::StatePlay, 2));

    player.stop()?;
    Ok(())
}

#[test]
fn test_pause_while_buffering() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    player.source_events().on_buffering_level(0);
    assert!(wait_for_state(&player, LifecycleState::Buffering));

    player.pause()?;
    assert_eq!(player.state(), LifecycleState::Paused);
    player.resume()?;
    assert!(player.state().is_running());
    player.stop()?;
    Ok(())
}

#[test]
fn test_auto_start_selects_and_plays() -> Result<()> {
    let fixture = TestFixture::new()?;
    let config = PlayerConfig {
        auto_start: true,
        ..PlayerConfig::default()
    };
    let player = fixture.player(config)?;

    player.add_source("clip.mp4", SourceType::File)?;
    assert!(wait_for_state(&player, LifecycleState::Playing));
    assert!(fixture.recorder.wait_for(EventId::StatePlay, 1));
    assert_eq!(player.enabled_streams(), vec![0, 1]);
    assert_eq!(
        fixture.recorder.ids(),
        vec![EventId::StateReady, EventId::StatePlay]
    );
    Ok(())
}

#[test]
fn test_auto_start_without_matching_language() -> Result<()> {
    let fixture = TestFixture::with_opener(ScriptedOpener::new(vec![
        StreamDescriptor::audio(0, "aac", 2, 48_000, LanguageCode::new("en")?),
    ]))?;
    let config = PlayerConfig {
        auto_start: true,
        default_language: LanguageCode::new("fr")?,
        ..PlayerConfig::default()
    };
    let player = fixture.player(config)?;

    player.add_source("clip.mp4", SourceType::File)?;
    thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(player.state(), LifecycleState::SourceAttached);
    assert!(player.enabled_streams().is_empty());
    Ok(())
}

#[test]
fn test_auto_start_empty_source_stops() -> Result<()> {
    let fixture = TestFixture::with_opener(ScriptedOpener::new(Vec::new()))?;
    let config = PlayerConfig {
        auto_start: true,
        ..PlayerConfig::default()
    };
    let player = fixture.player(config)?;

    player.add_source("empty.mp4", SourceType::File)?;
    assert!(wait_for_state(&player, LifecycleState::Stopped));
    Ok(())
}

#[test]
fn test_auto_play_next_source() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;
    let first = fixture.source()?;

    player.set_next_source("next.mp4", SourceType::Hls)?;
    feed(&first, 0, 3);
    assert!(player.video_data().is_some());
    assert_eq!(player.current_time(), 0);

    first.events().on_end_of_stream();
    assert!(wait_until(|| player.source_id() == 1 && player.state().is_running()));

    assert_eq!(fixture.opener.opened_count(), 2);
    assert!(!first.is_running());
    assert_eq!(fixture.source()?.path(), "next.mp4");
    assert_eq!(player.current_time(), 0);

    let last_play = fixture.recorder.events().into_iter()
        .filter(|e| e.id == EventId::StatePlay)
        .last()
        .unwrap();
    assert_eq!(last_play.source_id, 1);

    player.stop()?;
    Ok(())
}

#[test]
fn test_auto_play_next_open_failure() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.opener.fail_on("broken.mp4");
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    player.set_next_source("broken.mp4", SourceType::File)?;
    player.source_events().on_end_of_stream();
    assert!(wait_for_state(&player, LifecycleState::Error));
    assert_eq!(player.source_id(), 0);
    Ok(())
}

#[test]
fn test_handler_sees_transitions_synchronously() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;

    player.add_source("clip.mp4", SourceType::File)?;
    player.enable_stream(1)?;
    assert_eq!(fixture.recorder.ids(), vec![EventId::StateReady]);

    player.start()?;
    assert_eq!(fixture.recorder.ids(), vec![EventId::StateReady, EventId::StatePlay]);

    let events = fixture.recorder.events();
    let Some(EventData::State(change)) = &events[1].data else {
        panic!("missing state payload");
    };
    assert_eq!(change.previous, LifecycleState::Ready);
    assert_eq!(change.current, LifecycleState::Playing);
    assert!(player.poll_event().is_none());
    Ok(())
}

#[test]
fn test_polling_after_handler_removed() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.polling_player(PlayerConfig::default())?;
    start_clip(&player)?;

    assert_eq!(player.poll_event().map(|e| e.id), Some(EventId::StateReady));
    assert_eq!(player.poll_event().map(|e| e.id), Some(EventId::StatePlay));
    assert!(player.poll_event().is_none());

    player.set_event_handler(EventReplacement::Handler(fixture.recorder.clone()));
    player.pause()?;
    assert!(player.poll_event().is_none());
    assert_eq!(fixture.recorder.ids(), vec![EventId::StatePause]);

    player.set_event_handler(EventReplacement::None);
    player.stop()?;
    assert_eq!(player.poll_event().map(|e| e.id), Some(EventId::StateStop));
    Ok(())
}

#[test]
fn test_warnings_do_not_change_state() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;
    let rejected = player.rejected_transitions();

    player.source_events().on_warning(7);
    assert!(fixture.recorder.wait_for(EventId::WarningId, 1));

    let warning = fixture.recorder.events().into_iter()
        .find(|e| e.id == EventId::WarningId)
        .unwrap();
    assert!(matches!(warning.data, Some(EventData::Warning(7))));
    assert_eq!(player.state(), LifecycleState::Playing);
    assert_eq!(player.rejected_transitions(), rejected);
    Ok(())
}

#[test]
fn test_warnings_from_many_threads_keep_order() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let events = player.source_events();
            thread::spawn(move || {
                for i in 0..100 {
                    events.on_warning(p * 1000 + i);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(fixture.recorder.wait_for(EventId::WarningId, 400));
    let mut next = [0u32; 4];
    for event in fixture.recorder.events() {
        if let Some(EventData::Warning(code)) = event.data {
            let producer = (code / 1000) as usize;
            assert_eq!(code % 1000, next[producer]);
            next[producer] += 1;
        }
    }
    Ok(())
}

#[test]
fn test_custom_event_relayed() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    player.source_events().on_custom(0x1234, Some(EventData::Opaque(Arc::new(5u32))));
    assert!(fixture.recorder.wait_for(EventId::Other(0x1234), 1));

    let event = fixture.recorder.events().into_iter()
        .find(|e| e.id == EventId::Other(0x1234))
        .unwrap();
    let Some(EventData::Opaque(payload)) = event.data else {
        panic!("missing payload");
    };
    assert_eq!(payload.downcast_ref::<u32>(), Some(&5));
    Ok(())
}

#[test]
fn test_current_time_never_decreases() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;
    let source = fixture.source()?;

    let feeder = {
        let source = Arc::clone(&source);
        thread::spawn(move || {
            for i in 0..50u64 {
                // Late frames arrive out of order
                let timestamp = if i % 5 == 4 { i * 40 - 120 } else { i * 40 };
                source.push_video(source.make_video_frame(timestamp));
            }
        })
    };

    let mut last = 0;
    for _ in 0..500 {
        let _ = player.video_data();
        let now = player.current_time();
        assert!(now >= last, "clock went back from {} to {}", last, now);
        last = now;
    }
    feeder.join().unwrap();
    Ok(())
}

#[test]
fn test_stop_from_event_handler() -> Result<()> {
    let fixture = TestFixture::new()?;
    let slot: Arc<Mutex<Weak<AvPlayer>>> = Arc::new(Mutex::new(Weak::new()));

    let handler_slot = Arc::clone(&slot);
    let handler = move |event: &PlayerEvent| {
        if event.id == EventId::WarningId {
            let player = handler_slot.lock().upgrade();
            if let Some(player) = player {
                player.stop().unwrap();
            }
        }
    };

    let player = Arc::new(fixture.polling_player(PlayerConfig::default())?);
    player.set_event_handler(EventReplacement::Handler(Arc::new(handler)));
    *slot.lock() = Arc::downgrade(&player);

    start_clip(&player)?;
    player.source_events().on_warning(1);
    assert!(wait_for_state(&player, LifecycleState::Stopped));

    player.stop()?;
    Ok(())
}

#[test]
fn test_player_config_from_file() -> Result<()> {
    let fixture = TestFixture::new()?;
    let path = fixture.config_file(
        "[player]\nauto_start = true\ndefault_language = \"en\"\n\n[buffering]\nlow_watermark = 2\nhigh_watermark = 6\n",
    )?;

    let config = PlayerConfig::from_config(&Config::from_file(&path)?)?;
    assert!(config.auto_start);
    assert_eq!(config.default_language.as_str(), "en");
    assert_eq!(config.buffering.low_watermark, 2);

    let player = fixture.player(config)?;
    player.add_source("clip.mp4", SourceType::File)?;
    assert!(wait_for_state(&player, LifecycleState::Playing));
    Ok(())
}

#[test]
fn test_invalid_sources() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;

    assert!(matches!(player.start(), Err(AvPlayerError::NoSource)));
    assert!(matches!(player.add_source("", SourceType::File), Err(AvPlayerError::InvalidInput(_))));
    assert!(matches!(
        player.set_next_source("next", SourceType::Unknown),
        Err(AvPlayerError::UnsupportedSourceType(SourceType::Unknown))
    ));
    assert_eq!(player.state(), LifecycleState::Initial);
    assert_eq!(fixture.opener.opened_count(), 0);
    Ok(())
}

#[test]
fn test_error_before_start_is_fatal() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    player.add_source("clip.mp4", SourceType::File)?;
    player.enable_stream(0)?;

    fixture.source()?.events().on_error();
    assert!(wait_for_state(&player, LifecycleState::Error));
    assert!(!player.is_active());
    assert!(matches!(player.start(), Err(AvPlayerError::InvalidState(LifecycleState::Error))));

    player.stop()?;
    assert_eq!(player.state(), LifecycleState::Error);
    Ok(())
}

#[test]
fn test_end_of_stream_while_paused() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    player.pause()?;
    fixture.source()?.events().on_end_of_stream();
    assert!(wait_for_state(&player, LifecycleState::EndOfStream));
    assert_eq!(player.previous_state(), LifecycleState::Paused);
    assert!(!player.is_active());

    assert!(matches!(player.resume(), Err(AvPlayerError::InvalidState(LifecycleState::EndOfStream))));
    assert_eq!(player.rejected_transitions(), 0);
    Ok(())
}

#[test]
fn test_late_events_from_replaced_source_are_ignored() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;
    let first = fixture.source()?;

    player.set_next_source("next.mp4", SourceType::File)?;
    first.events().on_end_of_stream();
    assert!(wait_until(|| player.source_id() == 1 && player.state().is_running()));

    // The finished source keeps reporting after it was replaced
    first.events().on_end_of_stream();
    first.events().on_error();
    first.events().on_warning(1);

    let next = fixture.source()?;
    next.events().on_warning(2);
    assert!(fixture.recorder.wait_for(EventId::WarningId, 1));

    let warnings: Vec<_> = fixture.recorder.events().into_iter()
        .filter_map(|e| match e.data {
            Some(EventData::Warning(id)) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![2]);
    assert!(player.state().is_running());
    assert!(player.is_active());

    player.stop()?;
    Ok(())
}

#[test]
fn test_concurrent_stops_wait_for_stopped() -> Result<()> {
    let fixture = TestFixture::new()?;
    let player = fixture.player(PlayerConfig::default())?;
    start_clip(&player)?;

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                player.stop().unwrap();
                assert_eq!(player.state(), LifecycleState::Stopped);
                assert_eq!(fixture.recorder.count(EventId::StateStop), 1);
            });
        }
    });

    assert_eq!(fixture.recorder.count(EventId::StateStop), 1);
    Ok(())
}

#[test]
fn test_opener_restricted_to_files() -> Result<()> {
    let fixture = TestFixture::with_opener(ScriptedOpener::av_clip().with_supported(&[SourceType::File]))?;
    let player = fixture.player(PlayerConfig::default())?;

    assert!(matches!(
        player.add_source("live.m3u8", SourceType::Hls),
        Err(AvPlayerError::UnsupportedSourceType(SourceType::Hls))
    ));
    assert_eq!(player.state(), LifecycleState::Initial);

    start_clip(&player)?;
    assert!(matches!(
        player.set_next_source("live.m3u8", SourceType::Hls),
        Err(AvPlayerError::UnsupportedSourceType(SourceType::Hls))
    ));
    player.stop()?;
    Ok(())
}
