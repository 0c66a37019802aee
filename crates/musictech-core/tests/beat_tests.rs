use musictech_core::{BeatConfig, BeatDetector};

fn detector() -> BeatDetector {
    BeatDetector::new(&BeatConfig::default()).unwrap()
}

#[test]
fn test_spike_over_constant_history_flags_beat() {
    let config = BeatConfig::default();
    let mut beat = detector();
    let m = 0.25;

    let mut t = 0.0;
    for _ in 0..30 {
        assert!(!beat.update(m, true, t), "constant input must not flag");
        t += 1.0 / 60.0;
    }

    let spike = m * (2.0 + config.threshold);
    assert!(beat.update(spike, true, t), "spike should flag a beat");

    // Same value inside the cooldown window
    t += config.cooldown * 0.5;
    assert!(!beat.update(spike, true, t), "cooldown should suppress a second beat");
}

#[test]
fn test_all_zero_history_never_flags() {
    let mut beat = detector();
    for i in 0..500 {
        assert!(!beat.update(0.0, true, i as f32 * 0.1));
    }
}

#[test]
fn test_paused_updates_are_ignored() {
    let mut beat = detector();
    for i in 0..30 {
        beat.update(0.1, true, i as f32 * 0.05);
    }
    assert!(!beat.update(5.0, false, 10.0));
    assert_eq!(beat.history_len(), 30);
    // The spike is still fresh once playing resumes
    assert!(beat.update(5.0, true, 10.0));
}

#[test]
fn test_beat_after_cooldown_expires() {
    let config = BeatConfig::default();
    let mut beat = detector();
    for i in 0..30 {
        beat.update(0.1, true, i as f32 * 0.01);
    }
    assert!(beat.update(1.0, true, 1.0));
    for i in 0..30 {
        beat.update(0.1, true, 1.0 + i as f32 * 0.001);
    }
    assert!(beat.update(1.0, true, 1.0 + config.cooldown + 0.01));
}
