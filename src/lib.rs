// Drum sequencer - Library exports for the binary, tests and benchmarks

pub mod config;
pub mod error;
pub mod messaging;
pub mod sampler;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::SequencerConfig;
pub use error::{SequencerError, SequencerResult};
pub use messaging::channels::{create_command_channel, create_notification_channel, send_command};
pub use messaging::command::Command;
pub use messaging::notification::Notification;
pub use sampler::{InstrumentBank, SampleSource, VoiceQueueBank, VoiceTrigger};
pub use sequencer::{
    Instrument, PatternGrid, PlaybackState, Preset, PresetLibrary, Scheduler,
    SequencerController, SequencerSnapshot, Tempo, Transport, TransportClock, TriggerEvent,
};
