pub mod bank;

pub use bank::{
    InstrumentBank, SampleSource, VoiceQueueBank, VoiceTrigger, VoiceTriggerConsumer,
    VoiceTriggerProducer,
};
