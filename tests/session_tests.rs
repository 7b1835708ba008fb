mod common;

use common::{message, test_config, CountingOutputFactory, Script, ScriptedSourceFactory};
use specpipe_player::audio::{AudioOutput, ClockedOutput, DecodedFrame, OverflowPolicy};
use specpipe_player::playback::{PlaybackConfig, PlaybackSession, SchedulerState};
use specpipe_player::PipelineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const SUBJECT: &str = "specpipe.data.fm.rtl-sdr-1";

async fn start(
    sources: &ScriptedSourceFactory,
    outputs: &Arc<CountingOutputFactory>,
    config: PlaybackConfig,
) -> PlaybackSession {
    PlaybackSession::start("rtl-sdr-1", SUBJECT, config, sources, outputs.clone())
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_frames_play_back_to_back() {
    let mut output = ClockedOutput::new(common::SAMPLE_RATE);
    let frame = |sequence| DecodedFrame {
        samples: vec![0.25; 1600],
        sample_rate: common::SAMPLE_RATE,
        sequence,
    };

    let started = Instant::now();
    let first = output.play(frame(0)).unwrap();
    let second = output.play(frame(1)).unwrap();

    first.await.unwrap();
    let first_end = started.elapsed();
    second.await.unwrap();
    let second_end = started.elapsed();

    assert!(first_end >= Duration::from_millis(200) && first_end < Duration::from_millis(202));
    assert!(second_end >= Duration::from_millis(400) && second_end < Duration::from_millis(403));

    output.close();
    assert!(output.is_closed());
    assert!(output.play(frame(2)).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_closing_output_cancels_pending_frames() {
    let mut output = ClockedOutput::new(common::SAMPLE_RATE);
    let end = output
        .play(DecodedFrame {
            samples: vec![0.0; 8000],
            sample_rate: common::SAMPLE_RATE,
            sequence: 0,
        })
        .unwrap();

    output.close();
    output.close();
    assert!(end.await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_session_plays_every_frame_then_drains() {
    let config = test_config();
    let payload = message(&config, 1000);
    let sources = ScriptedSourceFactory::new(Script::Batches {
        batches: vec![
            vec![payload.clone(), payload.clone()],
            vec![payload.clone(), payload.clone()],
        ],
        ends: true,
    });
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    assert_eq!(sources.probe.live(), 1);

    sleep(Duration::from_secs(2)).await;

    assert!(session.is_finished());
    assert_eq!(session.state(), SchedulerState::Stopped);

    let stats = session.stop().await;
    assert!(session.error().is_none());
    assert_eq!(stats.messages_acked, 4);
    assert_eq!(stats.frames_decoded, 2);
    assert_eq!(stats.frames_played, 2);
    assert_eq!(stats.bytes_received, 4 * 1600);
    assert!(stats.last_message_at.is_some());

    assert_eq!(sources.probe.acked(), 4);
    assert_eq!(sources.probe.live(), 0);
    assert_eq!(outputs.probe.opened(), 1);
    assert_eq!(outputs.probe.live(), 0);
    assert_eq!(outputs.probe.rates(), vec![common::SAMPLE_RATE]);
}

#[tokio::test(start_paused = true)]
async fn test_partial_frame_is_never_played() {
    let config = test_config();
    let sources = ScriptedSourceFactory::new(Script::Batches {
        batches: vec![vec![message(&config, 1)]],
        ends: false,
    });
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(session.state(), SchedulerState::Priming);
    assert_eq!(outputs.probe.opened(), 0);

    let stats = session.stop().await;
    assert_eq!(stats.messages_acked, 1);
    assert_eq!(stats.frames_decoded, 0);
    assert!(stats.empty_polls > 0);
    assert_eq!(sources.probe.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_playback_releases_everything() {
    let config = test_config();
    let sources = ScriptedSourceFactory::new(Script::Endless(message(&config, -200)));
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_millis(900)).await;

    assert_eq!(session.state(), SchedulerState::Playing);
    assert!(!session.is_finished());
    assert_eq!(outputs.probe.live(), 1);

    let stats = session.stop().await;
    assert_eq!(stats.state, SchedulerState::Stopped);
    assert!(stats.frames_played >= 3);
    assert!(session.is_stopped());
    assert_eq!(sources.probe.live(), 0);
    assert_eq!(outputs.probe.live(), 0);
    assert_eq!(outputs.probe.max_live(), 1);

    // Second stop returns the same stats and does nothing else
    let again = session.stop().await;
    assert_eq!(again.frames_played, stats.frames_played);
    assert_eq!(sources.probe.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backpressure_bounds_decoded_frames() {
    let config = test_config();
    let sources = ScriptedSourceFactory::new(Script::Endless(message(&config, 7)));
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_secs(3)).await;

    let stats = session.stop().await;
    // One frame arrives per poll but only one plays per 200 ms
    assert!(stats.frames_decoded <= stats.frames_played + 4);
}

#[tokio::test(start_paused = true)]
async fn test_overflow_rejected_aborts_session() {
    let config = PlaybackConfig {
        overflow_policy: OverflowPolicy::Reject,
        ..test_config()
    };
    // Three 1200 byte payloads against a 3200 byte frame
    let payload = vec![0u8; 1200];
    let sources = ScriptedSourceFactory::new(Script::Batches {
        batches: vec![vec![payload.clone(), payload.clone(), payload]],
        ends: false,
    });
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_millis(500)).await;

    assert!(session.is_finished());
    session.stop().await;
    assert!(matches!(session.error(), Some(PipelineError::Framing { .. })));
    assert_eq!(sources.probe.live(), 0);
    assert_eq!(outputs.probe.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_overflow_split_carries_tail_into_next_frame() {
    let config = test_config();
    let sources = ScriptedSourceFactory::new(Script::Batches {
        batches: vec![vec![vec![0u8; 2000], vec![0u8; 2000]], vec![vec![0u8; 2400]]],
        ends: true,
    });
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_secs(2)).await;

    let stats = session.stop().await;
    assert!(session.error().is_none());
    assert_eq!(stats.frames_decoded, 2);
    assert_eq!(stats.frames_played, 2);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_stops_playback() {
    let config = test_config();
    let payload = message(&config, 3);
    let sources = ScriptedSourceFactory::new(Script::FailAfter(vec![vec![
        payload.clone(),
        payload,
    ]]));
    let outputs = Arc::new(CountingOutputFactory::default());

    let mut session = start(&sources, &outputs, config).await;
    sleep(Duration::from_millis(500)).await;

    assert!(session.is_finished());
    session.stop().await;
    assert!(matches!(
        session.error(),
        Some(PipelineError::Subscription { .. })
    ));
    assert_eq!(sources.probe.live(), 0);
    assert_eq!(outputs.probe.live(), 0);
}

#[tokio::test]
async fn test_start_failure_leaves_nothing_open() {
    let sources = ScriptedSourceFactory::new(Script::Endless(vec![0u8; 1600]));
    sources.fail_open(true);
    let outputs = Arc::new(CountingOutputFactory::default());

    let result =
        PlaybackSession::start("rtl-sdr-1", SUBJECT, test_config(), &sources, outputs.clone())
            .await;
    assert!(matches!(result, Err(PipelineError::Connection { .. })));
    assert_eq!(sources.probe.opened(), 0);
    assert_eq!(outputs.probe.opened(), 0);
}

#[tokio::test]
async fn test_invalid_layout_rejected_at_start() {
    let sources = ScriptedSourceFactory::new(Script::Endless(vec![0u8; 2]));
    let outputs = Arc::new(CountingOutputFactory::default());
    let config = PlaybackConfig {
        messages_per_frame: 0,
        ..test_config()
    };

    let result = PlaybackSession::start("rtl-sdr-1", SUBJECT, config, &sources, outputs).await;
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    assert_eq!(sources.probe.opened(), 0);
}
