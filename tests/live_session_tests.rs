//! Integration tests for the live audio session driven by scripted devices
//! and a scripted duplex channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tutor_live::core::audio::{self, CAPTURE_BLOCK_SIZE, PLAYBACK_SAMPLE_RATE};
use tutor_live::core::provider::{
    BoxedLiveHandle, LiveConnector, LiveEvent, LiveHandle, ProviderResult,
};
use tutor_live::core::session::{
    DisconnectCallback, LiveAudioSession, MockCapture, MockDeviceFactory, MockPlayback,
    MockPlaybackState, SessionState,
};

// =============================================================================
// Scripted channel
// =============================================================================

/// Records sent chunks; close flips a flag.
struct ScriptedHandle {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl LiveHandle for ScriptedHandle {
    async fn send_audio_chunk(&self, encoded: String) -> ProviderResult<()> {
        self.sent.lock().push(encoded);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out one prepared handle/event-stream pair.
struct ScriptedConnector {
    prepared: Mutex<Option<(BoxedLiveHandle, mpsc::Receiver<LiveEvent>)>>,
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(
        &self,
        _instruction: &str,
    ) -> ProviderResult<(BoxedLiveHandle, mpsc::Receiver<LiveEvent>)> {
        Ok(self.prepared.lock().take().expect("connect called twice"))
    }
}

struct Harness {
    session: LiveAudioSession,
    capture_tx: mpsc::Sender<Vec<f32>>,
    playback: Arc<Mutex<MockPlaybackState>>,
    events: mpsc::Sender<LiveEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    handle_closed: Arc<AtomicBool>,
    callback_count: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let (capture, capture_tx) = MockCapture::new();
    let (playback, playback_state) = MockPlayback::new();
    let devices = Arc::new(MockDeviceFactory::new(Box::new(capture), Box::new(playback)));

    let sent = Arc::new(Mutex::new(Vec::new()));
    let handle_closed = Arc::new(AtomicBool::new(false));
    let handle = ScriptedHandle {
        sent: sent.clone(),
        closed: handle_closed.clone(),
    };
    let (event_tx, event_rx) = mpsc::channel(16);
    let connector = Arc::new(ScriptedConnector {
        prepared: Mutex::new(Some((Box::new(handle) as BoxedLiveHandle, event_rx))),
    });

    let callback_count = Arc::new(AtomicUsize::new(0));
    let count = callback_count.clone();
    let on_disconnect: DisconnectCallback = Arc::new(move || {
        let count = count.clone();
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
        })
    });

    Harness {
        session: LiveAudioSession::new(connector, devices, "tutor kindly", on_disconnect),
        capture_tx,
        playback: playback_state,
        events: event_tx,
        sent,
        handle_closed,
        callback_count,
    }
}

/// Poll until `check` passes or a short deadline expires.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn audio_event(samples: usize) -> LiveEvent {
    LiveEvent::Audio(audio::encode_for_transport(&vec![0.25_f32; samples]))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_capture_blocks_are_encoded_and_sent() {
    let mut h = harness();
    h.session.connect().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Open);

    let block = vec![0.5_f32; CAPTURE_BLOCK_SIZE];
    h.capture_tx.send(block.clone()).await.unwrap();
    h.capture_tx.send(vec![-0.5_f32; CAPTURE_BLOCK_SIZE]).await.unwrap();

    let sent = h.sent.clone();
    wait_for(move || sent.lock().len() == 2).await;
    assert_eq!(h.sent.lock()[0], audio::encode_for_transport(&block));

    h.session.disconnect().await;
}

#[tokio::test]
async fn test_consecutive_units_schedule_gaplessly() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    // 0.1s then 0.2s of audio while the output clock sits at zero.
    h.events.send(audio_event(PLAYBACK_SAMPLE_RATE as usize / 10)).await.unwrap();
    h.events.send(audio_event(PLAYBACK_SAMPLE_RATE as usize / 5)).await.unwrap();

    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 2).await;

    {
        let state = h.playback.lock();
        let first = &state.played[0];
        let second = &state.played[1];
        assert_eq!(first.start_time, 0.0);
        assert!((second.start_time - 0.1).abs() < 1e-9);
        assert!(second.start_time >= state.clock);
    }
    assert_eq!(h.session.active_playback_units(), 2);
    assert!((h.session.next_start_time() - 0.3).abs() < 1e-9);

    h.session.disconnect().await;
}

#[tokio::test]
async fn test_late_unit_schedules_at_clock_time() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.events.send(audio_event(2400)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 1).await;

    // Clock has advanced well past the first unit's end.
    h.playback.lock().clock = 2.0;
    h.events.send(audio_event(2400)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 2).await;

    assert_eq!(h.playback.lock().played[1].start_time, 2.0);
    h.session.disconnect().await;
}

#[tokio::test]
async fn test_finished_units_are_retired_before_scheduling() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.events.send(audio_event(2400)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 1).await;
    assert_eq!(h.session.active_playback_units(), 1);

    // The device reports the first unit finished; the next schedule drains it.
    let first_id = h.playback.lock().played[0].id;
    h.playback.lock().finished_queue.push_back(first_id);
    h.events.send(audio_event(2400)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 2).await;

    assert_eq!(h.session.active_playback_units(), 1);
    h.session.disconnect().await;
}

#[tokio::test]
async fn test_interruption_silences_and_resets_schedule() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.events.send(audio_event(4800)).await.unwrap();
    h.events.send(audio_event(4800)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 2).await;

    h.events.send(LiveEvent::Interrupted).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().stop_all_calls == 1).await;
    assert_eq!(h.session.active_playback_units(), 0);
    assert_eq!(h.session.next_start_time(), 0.0);

    // The next unit schedules relative to "now", not the stale timeline.
    h.playback.lock().clock = 0.5;
    h.events.send(audio_event(2400)).await.unwrap();
    let playback = h.playback.clone();
    wait_for(move || playback.lock().played.len() == 3).await;
    assert_eq!(h.playback.lock().played[2].start_time, 0.5);

    h.session.disconnect().await;
}

#[tokio::test]
async fn test_remote_close_fires_callback_exactly_once() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.events
        .send(LiveEvent::Closed {
            reason: Some("server going away".to_string()),
        })
        .await
        .unwrap();

    let count = h.callback_count.clone();
    wait_for(move || count.load(Ordering::SeqCst) == 1).await;

    // A later local disconnect does not fire it again.
    h.session.disconnect().await;
    h.session.disconnect().await;
    assert_eq!(h.callback_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_local_disconnect_suppresses_callback() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.session.disconnect().await;

    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(h.handle_closed.load(Ordering::SeqCst));
    assert!(h.playback.lock().closed);
    assert_eq!(h.callback_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_capture_stops_sending_after_disconnect() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.capture_tx.send(vec![0.1_f32; CAPTURE_BLOCK_SIZE]).await.unwrap();
    let sent = h.sent.clone();
    wait_for(move || sent.lock().len() == 1).await;

    h.session.disconnect().await;

    // The capture loop has ended; nothing new reaches the channel.
    let _ = h.capture_tx.send(vec![0.2_f32; CAPTURE_BLOCK_SIZE]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_undecodable_audio_ends_session() {
    let mut h = harness();
    h.session.connect().await.unwrap();

    h.events
        .send(LiveEvent::Audio("%%not base64%%".to_string()))
        .await
        .unwrap();

    let count = h.callback_count.clone();
    wait_for(move || count.load(Ordering::SeqCst) == 1).await;
    assert!(h.playback.lock().played.is_empty());

    h.session.disconnect().await;
    assert_eq!(h.callback_count.load(Ordering::SeqCst), 1);
}
