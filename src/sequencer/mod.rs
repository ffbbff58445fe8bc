// Sequencer module
// Step grid, loop transport, grid → schedule translation and the controller tying them together

pub mod controller;
pub mod pattern;
pub mod preset;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use controller::{PlaybackState, SequencerController, SequencerSnapshot};
pub use pattern::{Instrument, PatternGrid};
pub use preset::{Preset, PresetLibrary};
pub use scheduler::{Scheduler, TriggerEvent, TriggerHandler};
pub use timeline::{Tempo, TempoRamp, TempoRange};
pub use transport::{Transport, TransportClock, TransportSettings, TransportState};
