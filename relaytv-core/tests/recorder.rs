mod common;

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tempfile::TempDir;

use relaytv_core::{
    CycleReport, DvrStore, NewTimer, ProcessSpawner, RecorderSettings, RecordingScheduler,
    SqliteDvrStore, TimerKind,
};

use common::{temp_store, MockSpawner};

const T: i64 = 1_700_000_000_000;

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteDvrStore>,
    spawner: Arc<MockSpawner>,
    scheduler: RecordingScheduler,
}

fn harness(capacity: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());
    let store = Arc::new(store);
    let spawner = MockSpawner::new();
    let settings = RecorderSettings::new(dir.path().join("recordings"), "http://127.0.0.1:3000")
        .with_capacity(capacity);
    let scheduler = RecordingScheduler::new(
        Arc::clone(&store) as Arc<dyn DvrStore>,
        settings,
        Some(Arc::clone(&spawner) as Arc<dyn ProcessSpawner>),
    );
    Harness {
        _dir: dir,
        store,
        spawner,
        scheduler,
    }
}

fn add_timer(
    store: &SqliteDvrStore,
    title: &str,
    channel: &str,
    start_ms: i64,
    end_ms: i64,
) -> i64 {
    store
        .add_timer(&NewTimer {
            kind: TimerKind::Once,
            title: title.into(),
            channel: channel.into(),
            start_ms,
            end_ms,
        })
        .unwrap()
}

#[tokio::test]
async fn due_timer_records_until_end_then_is_removed() {
    let h = harness(16);
    let timer_id = add_timer(&h.store, "Evening News", "5.1", T, T + 600_000);

    let report = h.scheduler.run_cycle(T).await;
    assert_eq!(report.started, 1);
    assert_eq!(h.spawner.spawn_count(), 1);

    let probe = h.spawner.probe(0);
    let input = probe.args.iter().position(|arg| arg == "-i").unwrap();
    assert_eq!(probe.args[input + 1], "http://127.0.0.1:3000/stream/5.1");
    assert!(probe.args.windows(2).any(|w| w == ["-c", "copy"]));
    assert!(probe.args.last().unwrap().ends_with(&format!("Evening_News-{T}.mp4")));

    let recordings = h.store.list_recordings().unwrap();
    assert_eq!(recordings.len(), 1);
    let recording_id = recordings[0].id;
    assert_eq!(recordings[0].start_ms, T);
    assert_eq!(recordings[0].end_ms, 0);
    assert_eq!(recordings[0].channel, "5.1");
    assert!(h.scheduler.handle().is_recording(recording_id).await);

    let midway = h.scheduler.run_cycle(T + 300_000).await;
    assert_eq!(midway, CycleReport::default());
    assert_eq!(probe.terminations(), 0);

    let report = h.scheduler.run_cycle(T + 600_000).await;
    assert_eq!(report.expired, 1);
    assert_eq!(probe.terminations(), 1);
    assert_eq!(
        h.store.find_recording(recording_id).unwrap().unwrap().end_ms,
        T + 600_000
    );
    assert!(h.store.list_timers().unwrap().iter().all(|t| t.id != timer_id));
    assert_eq!(h.scheduler.handle().active_recording_count().await, 0);
}

#[tokio::test]
async fn active_timer_is_not_started_twice() {
    let h = harness(16);
    add_timer(&h.store, "Show", "2.1", T, T + 60_000);

    h.scheduler.run_cycle(T).await;
    h.scheduler.run_cycle(T + 10_000).await;
    h.scheduler.run_cycle(T + 20_000).await;

    assert_eq!(h.spawner.spawn_count(), 1);
    assert_eq!(h.store.list_recordings().unwrap().len(), 1);
}

#[tokio::test]
async fn capacity_bounds_concurrent_recordings() {
    let h = harness(2);
    for n in 0..4 {
        add_timer(&h.store, &format!("Show {n}"), "2.1", T, T + 60_000);
    }

    let report = h.scheduler.run_cycle(T).await;
    assert_eq!(report.started, 2);
    assert_eq!(report.deferred, 2);
    assert_eq!(h.spawner.spawn_count(), 2);
    assert_eq!(h.scheduler.handle().active_recording_count().await, 2);

    // A freed slot is picked up on the next poll.
    h.spawner.probe(0).exit_with(0);
    let report = h.scheduler.run_cycle(T + 10_000).await;
    assert_eq!(report.crashed, 1);
    let report = h.scheduler.run_cycle(T + 20_000).await;
    assert_eq!(report.started, 1);
    assert_eq!(h.spawner.spawn_count(), 3);
}

#[tokio::test]
async fn crashed_encoder_frees_slot_and_keeps_timer() {
    let h = harness(16);
    let timer_id = add_timer(&h.store, "Show", "2.1", T, T + 60_000);
    h.scheduler.run_cycle(T).await;
    let recording_id = h.store.list_recordings().unwrap()[0].id;

    h.spawner.probe(0).exit_with(1);
    let report = h.scheduler.run_cycle(T + 5_000).await;
    assert_eq!(report.crashed, 1);
    assert_eq!(h.spawner.probe(0).terminations(), 0);
    assert!(!h.scheduler.handle().is_recording(recording_id).await);
    assert_eq!(
        h.store.find_recording(recording_id).unwrap().unwrap().end_ms,
        T + 5_000
    );
    assert!(h.store.list_timers().unwrap().iter().any(|t| t.id == timer_id));

    // Still inside the window, so the next poll re-arms it.
    let report = h.scheduler.run_cycle(T + 15_000).await;
    assert_eq!(report.started, 1);
    assert_eq!(h.spawner.spawn_count(), 2);
}

#[tokio::test]
async fn stopping_unknown_recording_touches_no_process() {
    let h = harness(16);
    add_timer(&h.store, "Show", "2.1", T, T + 60_000);
    h.scheduler.run_cycle(T).await;
    let recording_id = h.store.list_recordings().unwrap()[0].id;

    assert!(!h.scheduler.handle().stop_recording(recording_id + 100).await);
    assert_eq!(h.spawner.probe(0).terminations(), 0);
    assert!(h.scheduler.handle().is_recording(recording_id).await);
}

#[tokio::test]
async fn manual_stop_is_not_rearmed_while_timer_is_due() {
    let h = harness(16);
    let timer_id = add_timer(&h.store, "Show", "2.1", T, T + 60_000);
    h.scheduler.run_cycle(T).await;
    let recording_id = h.store.list_recordings().unwrap()[0].id;

    assert!(h.scheduler.handle().stop_recording(recording_id).await);
    assert_eq!(h.spawner.probe(0).terminations(), 1);
    assert!(h.store.find_recording(recording_id).unwrap().unwrap().end_ms > 0);
    assert!(h.store.list_timers().unwrap().iter().any(|t| t.id == timer_id));

    let report = h.scheduler.run_cycle(T + 10_000).await;
    assert_eq!(report.started, 0);
    assert_eq!(h.spawner.spawn_count(), 1);
}

#[tokio::test]
async fn spawn_failure_closes_recording_and_continues() {
    let h = harness(16);
    add_timer(&h.store, "Broken", "2.1", T, T + 60_000);
    h.spawner.fail_spawns(true);

    let report = h.scheduler.run_cycle(T).await;
    assert_eq!(report.failed, 1);
    assert_eq!(h.scheduler.handle().active_recording_count().await, 0);
    let recordings = h.store.list_recordings().unwrap();
    assert_eq!(recordings.len(), 1);
    assert_eq!(recordings[0].end_ms, T);

    h.spawner.fail_spawns(false);
    let report = h.scheduler.run_cycle(T + 10_000).await;
    assert_eq!(report.started, 1);
}

#[tokio::test]
async fn timers_outside_window_are_ignored() {
    let h = harness(16);
    add_timer(&h.store, "Later", "2.1", T + 60_000, T + 120_000);
    add_timer(&h.store, "Earlier", "2.1", T - 120_000, T - 60_000);

    let report = h.scheduler.run_cycle(T).await;
    assert_eq!(report, CycleReport::default());
    assert_eq!(h.spawner.spawn_count(), 0);
}

#[tokio::test]
async fn slot_table_is_free_while_encoders_spawn() {
    let h = harness(16);
    add_timer(&h.store, "First", "2.1", T, T + 60_000);
    add_timer(&h.store, "Second", "4.1", T, T + 60_000);

    let handle = h.scheduler.handle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.spawner.on_spawn(move || {
        let count = handle.active_recording_count().now_or_never();
        sink.lock().unwrap().push(count);
    });

    let report = h.scheduler.run_cycle(T).await;
    assert_eq!(report.started, 2);
    // Each spawn could read the table, and saw the slots filled before it.
    assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(1)]);
}

#[tokio::test]
async fn stop_after_expiry_is_a_no_op() {
    let h = harness(16);
    add_timer(&h.store, "Show", "2.1", T, T + 60_000);
    h.scheduler.run_cycle(T).await;
    let recording_id = h.store.list_recordings().unwrap()[0].id;

    let report = h.scheduler.run_cycle(T + 60_000).await;
    assert_eq!(report.expired, 1);

    assert!(!h.scheduler.handle().stop_recording(recording_id).await);
    assert_eq!(h.spawner.probe(0).terminations(), 1);
    assert_eq!(
        h.store.find_recording(recording_id).unwrap().unwrap().end_ms,
        T + 60_000
    );
}

#[tokio::test]
async fn expiry_after_stop_leaves_stopped_recording_alone() {
    let h = harness(16);
    let timer_id = add_timer(&h.store, "Show", "2.1", T, T + 60_000);
    h.scheduler.run_cycle(T).await;
    let recording_id = h.store.list_recordings().unwrap()[0].id;

    assert!(h.scheduler.handle().stop_recording(recording_id).await);
    let stopped_at = h.store.find_recording(recording_id).unwrap().unwrap().end_ms;

    let report = h.scheduler.run_cycle(T + 60_000).await;
    assert_eq!(report, CycleReport::default());
    assert_eq!(h.spawner.probe(0).terminations(), 1);
    assert_eq!(h.spawner.spawn_count(), 1);
    assert_eq!(
        h.store.find_recording(recording_id).unwrap().unwrap().end_ms,
        stopped_at
    );
    // The window has closed, so the timer simply stops being due.
    assert!(h.store.list_timers().unwrap().iter().any(|t| t.id == timer_id));
}
