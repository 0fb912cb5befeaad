use squelch_engine::{
    EngineConfig, OfflineRenderer, RecordingDispatch, Scheduler, SchedulerConfig, SessionHandle,
    StepMarker, VoiceEvent,
};
use squelch_shared::{Note, PitchClass, Session};

fn four_on_the_floor(bpm: u32) -> Session {
    let mut session = Session::new();
    session.set_bpm(bpm);
    session.add_block();
    for block in 0..2 {
        for step in 0..16 {
            if step % 4 == 0 {
                session.toggle_drum(block, step, 0).unwrap();
            }
            if step % 2 == 1 {
                session.toggle_drum(block, step, 2).unwrap();
            }
        }
        let note = Note::new(PitchClass::from_semitone(block as u8 * 5), 1).with_slide(true);
        session.set_note(block, "bass1", 6, Some(note)).unwrap();
    }
    session
}

/// Drives a scheduler through the given tick times.
fn drive(session: &Session, config: SchedulerConfig, ticks: &[f64]) -> (Vec<StepMarker>, Vec<VoiceEvent>) {
    let mut scheduler = Scheduler::new(config);
    let mut recorder = RecordingDispatch::new();
    let mut markers = Vec::new();
    scheduler.start(0.0, 0);
    for &now in ticks {
        scheduler.tick(session, now, Some(&mut recorder));
        markers.extend(scheduler.drain_markers());
    }
    (markers, recorder.into_events())
}

fn regular_ticks(interval: f64, until: f64) -> Vec<f64> {
    (0..).map(|i| i as f64 * interval).take_while(|t| *t <= until).collect()
}

fn jittered_ticks(seed: u64, until: f64) -> Vec<f64> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut ticks = Vec::new();
    let mut now = 0.0;
    while now <= until {
        ticks.push(now);
        match rng.u8(0..4) {
            // duplicated tick
            0 => ticks.push(now),
            // early tick
            1 => now += 0.004,
            // late, throttled tick
            2 => now += 0.09,
            _ => now += 0.025,
        }
    }
    ticks
}

#[test]
fn step_spacing_ignores_tick_jitter() {
    let session = four_on_the_floor(128);
    let config = SchedulerConfig::default();
    let step = 60.0 / 128.0 / 4.0;

    let (regular, regular_events) = drive(&session, config, &regular_ticks(0.025, 4.0));
    for seed in [1, 7, 42] {
        let (jittered, jittered_events) = drive(&session, config, &jittered_ticks(seed, 4.0));
        let n = regular.len().min(jittered.len());
        assert!(n > 20);
        assert_eq!(&regular[..n], &jittered[..n]);

        let shared: Vec<_> = jittered_events
            .iter()
            .filter(|e| e.at_time() <= regular.last().unwrap().time)
            .collect();
        let expected: Vec<_> = regular_events
            .iter()
            .filter(|e| e.at_time() <= jittered.last().unwrap().time)
            .collect();
        assert_eq!(shared, expected);
    }

    for pair in regular.windows(2) {
        assert!((pair[1].time - pair[0].time - step).abs() < 1e-9);
    }
}

#[test]
fn tempo_change_applies_from_the_next_step() {
    let handle = SessionHandle::new(four_on_the_floor(120));
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.start(0.0, 0);

    scheduler.tick(&handle.load(), 0.45, None);
    let before: Vec<_> = scheduler.drain_markers().collect();
    assert_eq!(before.len(), 4);

    handle.set_bpm(150);
    scheduler.tick(&handle.load(), 1.0, None);
    let after: Vec<_> = scheduler.drain_markers().collect();

    // the step already queued at the old tempo keeps its time
    assert!((after[0].time - (before[3].time + 0.125)).abs() < 1e-9);
    for pair in after.windows(2) {
        assert!((pair[1].time - pair[0].time - 0.1).abs() < 1e-9);
    }
}

#[test]
fn block_removed_during_playback_is_clamped() {
    let handle = SessionHandle::new(four_on_the_floor(120));
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.start(0.0, 1);
    scheduler.tick(&handle.load(), 0.3, None);
    assert_eq!(scheduler.position().0, 1);

    handle.edit(|s| s.remove_block(1)).unwrap();
    scheduler.tick(&handle.load(), 3.0, None);
    assert!(scheduler.drain_markers().skip(3).all(|m| m.block == 0));
}

#[test]
fn live_and_offline_trigger_the_same_events() {
    let session = four_on_the_floor(137);
    let config = EngineConfig::default();
    let renderer = OfflineRenderer::new(config.clone());
    let offline = renderer.collect_events(&session, 2).unwrap();

    let live_config = SchedulerConfig {
        lookahead: config.lookahead(),
        start_offset: 0.0,
    };
    let (markers, live) = drive(&session, live_config, &jittered_ticks(99, 8.0));
    let end = markers[64].time;
    let live: Vec<_> = live.into_iter().filter(|e| e.at_time() < end).collect();

    assert!(!offline.is_empty());
    assert_eq!(live, offline);
}
