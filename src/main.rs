use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, Stream, StreamConfig};
use drum_sequencer::sampler::VoiceTriggerConsumer;
use drum_sequencer::{
    Instrument, InstrumentBank, PresetLibrary, SampleSource, SequencerConfig, SequencerController,
    TransportClock, VoiceQueueBank,
};
use ringbuf::traits::Consumer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;

/// Step-sequencer drum machine driven by the default audio output clock
#[derive(Debug, Parser)]
#[command(name = "drum-sequencer", version)]
struct Args {
    /// Preset to load before playing
    #[arg(short, long, default_value = "rock")]
    preset: String,

    /// Tempo override in BPM
    #[arg(short, long)]
    bpm: Option<f64>,

    /// Config file (RON); defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra presets (JSON array)
    #[arg(long)]
    presets: Option<PathBuf>,

    /// How long to play, in seconds
    #[arg(short, long, default_value_t = 8)]
    seconds: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Output stream used only as the transport clock
struct AudioClock {
    _stream: Stream,
    sample_rate: f64,
}

impl AudioClock {
    /// Open the default output device and report its sample rate
    fn open_device() -> Result<(cpal::Device, cpal::SupportedStreamConfig), String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("No audio device found")?;

        tracing::info!(
            device = %device.name().unwrap_or("Unknown".to_string()),
            "audio device"
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| format!("Configuration error: {}", e))?;
        Ok((device, supported_config))
    }

    fn start(
        device: &cpal::Device,
        supported_config: cpal::SupportedStreamConfig,
        clock: TransportClock,
    ) -> Result<Self, String> {
        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f64;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(device, &config, channels, clock),
            SampleFormat::I16 => Self::build_stream::<i16>(device, &config, channels, clock),
            SampleFormat::U16 => Self::build_stream::<u16>(device, &config, channels, clock),
            _ => {
                return Err(format!(
                    "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                    sample_format
                ));
            }
        }?;

        stream
            .play()
            .map_err(|e| format!("Failed to start stream: {}", e))?;

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        channels: usize,
        mut clock: TransportClock,
    ) -> Result<Stream, String>
    where
        T: SizedSample,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Samples are rendered elsewhere; this callback only keeps time
                    data.fill(<T as cpal::Sample>::EQUILIBRIUM);
                    clock.advance(data.len() / channels.max(1));
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Error in stream creation: {}", e))
    }
}

fn drain_voices(voices: &mut VoiceTriggerConsumer) {
    while let Some(voice) = voices.try_pop() {
        if voice.preview {
            tracing::info!(instrument = %voice.instrument, at = voice.at_time, "preview");
        } else {
            tracing::info!(instrument = %voice.instrument, at = voice.at_time, "hit");
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => SequencerConfig::load_from_file(path),
        None => SequencerConfig::load_or_default(),
    }
    .map_err(|e| e.to_string())?;

    let (device, supported_config) = AudioClock::open_device()?;
    config.sample_rate = supported_config.sample_rate().0 as f64;

    let (bank, mut voices) = VoiceQueueBank::new(config.voice_queue_capacity);
    for instrument in Instrument::ALL {
        bank.load(
            instrument,
            SampleSource::new(format!("samples/drum/{}.ogg", instrument.name())),
        );
    }

    let mut presets = PresetLibrary::builtin();
    if let Some(path) = &args.presets {
        let count = presets.load_json_file(path).map_err(|e| e.to_string())?;
        tracing::info!(count, path = %path.display(), "presets loaded");
    }

    let mut sequencer = SequencerController::new(config, Arc::new(bank))
        .map_err(|e| e.to_string())?
        .with_presets(presets);
    let mut notifications = sequencer.subscribe();

    sequencer
        .load_preset(&args.preset)
        .map_err(|e| e.to_string())?;
    if let Some(bpm) = args.bpm {
        sequencer.set_tempo(bpm).map_err(|e| e.to_string())?;
    }
    print!("{}", sequencer.grid());

    let audio = AudioClock::start(&device, supported_config, sequencer.clock())?;
    tracing::info!(sample_rate = audio.sample_rate, "audio clock running");

    sequencer.play();
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while Instant::now() < deadline {
        drain_voices(&mut voices);
        while let Some(notification) = notifications.try_pop() {
            tracing::info!("{}", notification);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    sequencer.shutdown();
    drain_voices(&mut voices);
    Ok(())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
