use crate::messaging::channels::bounded;
use crate::sequencer::pattern::Instrument;
use parking_lot::Mutex;
use ringbuf::traits::Producer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Where an instrument's sample comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSource {
    /// Sample file, decoded by the playback side
    pub path: PathBuf,
    /// Volume multiplier
    pub volume: f32,
}

impl SampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            volume: 1.0,
        }
    }
}

/// Playable sample voices, one per instrument
///
/// The sequencer only ever calls [`InstrumentBank::trigger`]; decoding and output
/// routing stay behind this trait. Triggers arrive from the audio clock, so
/// implementations must not block.
pub trait InstrumentBank: Send + Sync {
    /// Associate an instrument with a sample
    fn load(&self, instrument: Instrument, source: SampleSource);

    /// Play `instrument` at audio-clock time `at_time` (seconds)
    fn trigger(&self, instrument: Instrument, at_time: f64);

    /// Play `instrument` as editing feedback
    fn preview(&self, instrument: Instrument, at_time: f64) {
        self.trigger(instrument, at_time);
    }
}

/// A trigger request handed to the playback side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTrigger {
    pub instrument: Instrument,
    pub at_time: f64,
    pub preview: bool,
}

pub type VoiceTriggerProducer = ringbuf::HeapProd<VoiceTrigger>;
pub type VoiceTriggerConsumer = ringbuf::HeapCons<VoiceTrigger>;

/// Instrument bank that forwards triggers through a lock-free ring buffer
///
/// The consumer end belongs to whatever renders the samples.
pub struct VoiceQueueBank {
    sources: Mutex<HashMap<Instrument, SampleSource>>,
    queue: Mutex<VoiceTriggerProducer>,
}

impl VoiceQueueBank {
    /// Create a bank and the consumer for its trigger queue
    pub fn new(capacity: usize) -> (Self, VoiceTriggerConsumer) {
        let (producer, consumer) = bounded::<VoiceTrigger>(capacity);
        let bank = Self {
            sources: Mutex::new(HashMap::new()),
            queue: Mutex::new(producer),
        };
        (bank, consumer)
    }

    /// Sample loaded for `instrument`, if any
    pub fn source(&self, instrument: Instrument) -> Option<SampleSource> {
        self.sources.lock().get(&instrument).cloned()
    }

    fn push(&self, trigger: VoiceTrigger) {
        // Never wait on the queue from the clock path
        let Some(mut queue) = self.queue.try_lock() else {
            tracing::warn!(instrument = %trigger.instrument, "voice queue busy, trigger dropped");
            return;
        };
        if queue.try_push(trigger).is_err() {
            tracing::warn!(instrument = %trigger.instrument, "voice queue full, trigger dropped");
        }
    }
}

impl InstrumentBank for VoiceQueueBank {
    fn load(&self, instrument: Instrument, source: SampleSource) {
        tracing::debug!(%instrument, path = %source.path.display(), "sample mapped");
        self.sources.lock().insert(instrument, source);
    }

    fn trigger(&self, instrument: Instrument, at_time: f64) {
        self.push(VoiceTrigger {
            instrument,
            at_time,
            preview: false,
        });
    }

    fn preview(&self, instrument: Instrument, at_time: f64) {
        self.push(VoiceTrigger {
            instrument,
            at_time,
            preview: true,
        });
    }
}
