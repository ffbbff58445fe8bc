// Integration tests for preset/config files and the voice trigger queue
// Files live in temp directories; the audio clock is driven by hand

use drum_sequencer::messaging::command::Command;
use drum_sequencer::{
    Instrument, InstrumentBank, Notification, PatternGrid, PlaybackState, Preset, PresetLibrary,
    SampleSource, SequencerConfig, SequencerController, SequencerError, VoiceQueueBank,
    create_command_channel,
};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_preset_library_file_integration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("presets.json");

    let mut library = PresetLibrary::builtin();
    let halftime = Preset::new(
        "halftime",
        70.0,
        PatternGrid::parse(&[
            "................",
            "x.x.x.x.x.x.x.x.",
            "........x.......",
            "x.........x.....",
        ])
        .unwrap(),
    );
    library.insert(halftime.clone());
    library.save_json_file(&path).unwrap();

    let mut loaded = PresetLibrary::new();
    let count = loaded.load_json_file(&path).unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        loaded.names().collect::<Vec<_>>(),
        vec!["halftime", "house", "rock"]
    );
    assert_eq!(loaded.get("halftime").unwrap(), &halftime);

    // Loaded presets drive the controller like built-ins
    let (bank, _voices) = VoiceQueueBank::new(64);
    let mut seq = SequencerController::new(SequencerConfig::default(), Arc::new(bank))
        .unwrap()
        .with_presets(loaded);
    seq.load_preset("halftime").unwrap();
    assert_eq!(seq.tempo().bpm(), 70.0);
    assert_eq!(seq.grid(), &halftime.pattern);
}

#[test]
fn test_preset_file_with_bad_grid_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"[{"name": "ragged", "bpm": 90.0, "pattern": [[1, 0, 1], [1, 0]]}]"#,
    )
    .unwrap();

    let mut library = PresetLibrary::builtin();
    assert!(library.load_json_file(&path).is_err());
    // The library is untouched by a failed load
    assert_eq!(library.len(), 2);
}

#[test]
fn test_preset_with_wrong_shape_leaves_state_alone() {
    let (bank, _voices) = VoiceQueueBank::new(64);
    let mut seq = SequencerController::new(SequencerConfig::default(), Arc::new(bank)).unwrap();
    let mut notifications = seq.subscribe();
    seq.load_preset("rock").unwrap();
    while notifications.try_pop().is_some() {}

    let eight_steps = Preset::new("short", 110.0, PatternGrid::default_grid(4, 8));
    let result = seq.apply_preset(&eight_steps);

    assert!(matches!(result, Err(SequencerError::ShapeMismatch { .. })));
    assert_eq!(seq.grid(), &Preset::rock().pattern);
    assert_eq!(seq.tempo().bpm(), 100.0);
    assert!(matches!(
        notifications.try_pop(),
        Some(Notification::CommandRejected(_))
    ));
}

#[test]
fn test_config_file_drives_controller() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.ron");

    let config = SequencerConfig {
        subdivisions: 8,
        default_bpm: 96.0,
        preview_on_toggle: false,
        ..Default::default()
    };
    config.save_to_file(&path).unwrap();

    let loaded = SequencerConfig::load_from_file(&path).unwrap();
    let (bank, _voices) = VoiceQueueBank::new(64);
    let seq = SequencerController::new(loaded, Arc::new(bank)).unwrap();

    assert_eq!(seq.tempo().bpm(), 96.0);
    assert_eq!(seq.grid(), &PatternGrid::default_grid(4, 8));
}

#[test]
fn test_config_with_non_integral_subdivision_fails() {
    let config = SequencerConfig {
        subdivisions: 10,
        ..Default::default()
    };
    let (bank, _voices) = VoiceQueueBank::new(64);

    let result = SequencerController::new(config, Arc::new(bank));
    assert!(result.is_err());
}

#[test]
fn test_voice_queue_end_to_end() {
    let config = SequencerConfig {
        default_bpm: 120.0,
        ..Default::default()
    };
    let (bank, mut voices) = VoiceQueueBank::new(256);
    bank.load(Instrument::Kick, SampleSource::new("samples/drum/kick.ogg"));
    assert!(bank.source(Instrument::Kick).is_some());

    let mut seq = SequencerController::new(config, Arc::new(bank)).unwrap();
    let mut clock = seq.clock();

    // Toggled on while stopped: one preview, heard at the next block
    assert!(seq.toggle_cell(Instrument::Kick.row(), 0).unwrap());
    seq.toggle_cell(Instrument::Snare.row(), 8).unwrap();
    clock.advance(512);

    let previews: Vec<_> = std::iter::from_fn(|| voices.try_pop()).collect();
    assert_eq!(previews.len(), 2);
    assert!(previews.iter().all(|v| v.preview));
    assert_eq!(previews[0].instrument, Instrument::Kick);
    assert_eq!(previews[1].instrument, Instrument::Snare);

    // Three quarters of a bar at 120 BPM
    seq.play();
    let start = clock.audio_time();
    for _ in 0..150 {
        clock.advance(480);
    }

    let hits: Vec<_> = std::iter::from_fn(|| voices.try_pop()).collect();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|v| !v.preview));
    assert_eq!(hits[0].instrument, Instrument::Kick);
    assert!((hits[0].at_time - start).abs() < 1e-9);
    assert_eq!(hits[1].instrument, Instrument::Snare);
    assert!((hits[1].at_time - start - 1.0).abs() < 1e-9);
}

#[test]
fn test_command_channel_drives_controller() {
    let (bank, _voices) = VoiceQueueBank::new(64);
    let mut seq = SequencerController::new(SequencerConfig::default(), Arc::new(bank)).unwrap();
    let (mut tx, mut rx) = create_command_channel(16);

    tx.try_push(Command::LoadPreset("house".to_string())).unwrap();
    tx.try_push(Command::SetTempo(10.0)).unwrap();
    tx.try_push(Command::ToggleCell { row: 0, col: 1 }).unwrap();
    tx.try_push(Command::Play).unwrap();

    let processed = seq.process_commands(&mut rx);

    assert_eq!(processed, 4);
    // The rejected tempo leaves the preset tempo in place
    assert_eq!(seq.tempo().bpm(), 140.0);
    assert!(seq.grid().is_active(0, 1));
    assert_eq!(seq.playback_state(), PlaybackState::Playing);
}
