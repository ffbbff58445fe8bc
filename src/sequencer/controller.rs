// Sequencer controller - Top-level state machine and command surface
// Owns tempo, grid and playback state; every edit rebuilds the transport schedule

use super::pattern::{Instrument, PatternGrid};
use super::preset::{Preset, PresetLibrary};
use super::scheduler::{Scheduler, TriggerEvent, TriggerHandler};
use super::timeline::Tempo;
use super::transport::{Transport, TransportClock};
use crate::config::SequencerConfig;
use crate::error::{SequencerError, SequencerResult};
use crate::messaging::channels::{
    CommandConsumer, NotificationConsumer, NotificationProducer, create_notification_channel,
};
use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use crate::sampler::bank::InstrumentBank;
use ringbuf::traits::{Consumer, Producer};
use serde::Serialize;
use std::sync::Arc;

/// Playback state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Everything the UI needs to draw the sequencer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencerSnapshot {
    pub tempo: Tempo,
    pub grid: PatternGrid,
    pub playback: PlaybackState,
    pub step: usize,
}

/// Drum machine controller
///
/// All access to the transport goes through here. Commands return immediately;
/// their effect is heard from the next clock block on.
pub struct SequencerController {
    config: SequencerConfig,
    transport: Transport,
    scheduler: Scheduler,
    bank: Arc<dyn InstrumentBank>,
    presets: PresetLibrary,
    default_tempo: Tempo,
    tempo: Tempo,
    grid: PatternGrid,
    state: PlaybackState,
    notifications: Option<NotificationProducer>,
}

impl SequencerController {
    /// Create a stopped sequencer with the default tempo and an empty grid
    ///
    /// Fails on invalid configuration, `NonIntegralSubdivision` included.
    pub fn new(config: SequencerConfig, bank: Arc<dyn InstrumentBank>) -> SequencerResult<Self> {
        config.validate()?;
        let scheduler = Scheduler::new(config.ticks_per_bar, config.subdivisions)?;
        let transport = Transport::from_config(&config)?;
        let default_tempo = transport.tempo();
        let grid = PatternGrid::default_grid(Instrument::COUNT, config.subdivisions as usize);

        let controller = Self {
            config,
            transport,
            scheduler,
            bank,
            presets: PresetLibrary::builtin(),
            default_tempo,
            tempo: default_tempo,
            grid,
            state: PlaybackState::Stopped,
            notifications: None,
        };
        controller.install(&controller.grid)?;

        tracing::info!(
            tempo = %controller.tempo,
            steps = controller.config.subdivisions,
            "sequencer ready"
        );
        Ok(controller)
    }

    /// Replace the preset library
    pub fn with_presets(mut self, presets: PresetLibrary) -> Self {
        self.presets = presets;
        self
    }

    /// Open the notification channel, replacing any previous subscriber
    pub fn subscribe(&mut self) -> NotificationConsumer {
        let (producer, consumer) = create_notification_channel(self.config.notification_capacity);
        self.notifications = Some(producer);
        consumer
    }

    // --- Observation ---

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Current grid snapshot; later edits never change it
    pub fn grid(&self) -> &PatternGrid {
        &self.grid
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state
    }

    /// Step under the playhead
    pub fn current_step(&self) -> usize {
        self.scheduler.step_at(self.transport.position_ticks())
    }

    pub fn snapshot(&self) -> SequencerSnapshot {
        SequencerSnapshot {
            tempo: self.tempo,
            grid: self.grid.clone(),
            playback: self.state,
            step: self.current_step(),
        }
    }

    /// Events derived from the current grid
    pub fn scheduled_events(&self) -> Vec<TriggerEvent> {
        self.scheduler.build(&self.grid)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Handle for the audio thread driving playback
    pub fn clock(&self) -> TransportClock {
        self.transport.clock()
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetLibrary {
        &mut self.presets
    }

    // --- Commands ---

    /// Stopped → Playing
    pub fn play(&mut self) {
        if self.state.is_playing() {
            return;
        }
        self.transport.start();
        self.state = PlaybackState::Playing;
        tracing::info!("play");
        self.notify(Notification::PlaybackChanged(self.state));
    }

    /// Playing → Stopped, keeping the playhead where it is
    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.transport.stop();
        self.state = PlaybackState::Stopped;
        tracing::info!("pause");
        self.notify(Notification::PlaybackChanged(self.state));
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Stop, rewind, and restore the default tempo and an empty grid
    pub fn reset(&mut self) -> SequencerResult<()> {
        self.pause();
        self.transport.cancel_one_shots();
        self.transport.rewind();

        let grid = PatternGrid::default_grid(Instrument::COUNT, self.config.subdivisions as usize);
        if let Err(err) = self.install(&grid) {
            return Err(self.reject(err));
        }
        self.grid = grid;
        self.tempo = match self.transport.set_tempo(self.default_tempo.bpm()) {
            Ok(tempo) => tempo,
            Err(err) => return Err(self.reject(err)),
        };

        tracing::info!(tempo = %self.tempo, "reset");
        self.notify(Notification::Reset);
        self.notify(Notification::TempoChanged(self.tempo));
        self.notify(Notification::PatternChanged(self.grid.clone()));
        Ok(())
    }

    /// Ramp to a new tempo
    ///
    /// Out-of-range or non-finite values fail with `InvalidTempo`; the tempo is kept.
    pub fn set_tempo(&mut self, bpm: f64) -> SequencerResult<Tempo> {
        match self.transport.set_tempo(bpm) {
            Ok(tempo) => {
                self.tempo = tempo;
                tracing::debug!(%tempo, "tempo set");
                self.notify(Notification::TempoChanged(tempo));
                Ok(tempo)
            }
            Err(err) => Err(self.reject(err)),
        }
    }

    /// Flip one cell and reschedule
    ///
    /// Returns the new cell value. Switching a cell on while stopped also queues a
    /// one-shot preview of its instrument when `preview_on_toggle` is set.
    pub fn toggle_cell(&mut self, row: usize, col: usize) -> SequencerResult<bool> {
        let grid = match self.grid.toggle(row, col) {
            Ok(grid) => grid,
            Err(err) => return Err(self.reject(err)),
        };
        if let Err(err) = self.install(&grid) {
            return Err(self.reject(err));
        }

        let active = grid.is_active(row, col);
        self.grid = grid;
        tracing::debug!(row, col, active, "cell toggled");

        if active && !self.state.is_playing() && self.config.preview_on_toggle {
            if let Some(instrument) = Instrument::from_row(row) {
                self.queue_preview(instrument);
            }
        }

        self.notify(Notification::PatternChanged(self.grid.clone()));
        Ok(active)
    }

    /// Replace tempo and grid from a named preset in the library
    pub fn load_preset(&mut self, name: &str) -> SequencerResult<()> {
        let preset = match self.presets.get(name).cloned() {
            Ok(preset) => preset,
            Err(err) => return Err(self.reject(err)),
        };
        self.apply_preset(&preset)
    }

    /// Replace tempo and grid from a preset value
    ///
    /// Both values are validated before anything changes. Pending previews and the
    /// old schedule are dropped.
    pub fn apply_preset(&mut self, preset: &Preset) -> SequencerResult<()> {
        let checked = self
            .transport
            .settings()
            .tempo_range
            .check(preset.bpm)
            .and_then(|tempo| {
                preset
                    .pattern
                    .ensure_shape(Instrument::COUNT, self.config.subdivisions as usize)
                    .map(|_| tempo)
            });
        if let Err(err) = checked {
            return Err(self.reject(err));
        }

        self.transport.cancel_one_shots();
        if let Err(err) = self.install(&preset.pattern) {
            return Err(self.reject(err));
        }
        self.grid = preset.pattern.clone();
        self.tempo = match self.transport.set_tempo(preset.bpm) {
            Ok(tempo) => tempo,
            Err(err) => return Err(self.reject(err)),
        };

        tracing::info!(preset = %preset.name, tempo = %self.tempo, "preset loaded");
        self.notify(Notification::PresetLoaded {
            name: preset.name.clone(),
            tempo: self.tempo,
        });
        self.notify(Notification::PatternChanged(self.grid.clone()));
        Ok(())
    }

    /// Run a UI command
    pub fn execute(&mut self, command: Command) -> SequencerResult<()> {
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::TogglePlay => self.toggle_play(),
            Command::Reset => self.reset()?,
            Command::SetTempo(bpm) => {
                self.set_tempo(bpm)?;
            }
            Command::ToggleCell { row, col } => {
                self.toggle_cell(row, col)?;
            }
            Command::LoadPreset(name) => self.load_preset(&name)?,
        }
        Ok(())
    }

    /// Drain and run queued UI commands
    ///
    /// Failed commands are reported through notifications and do not stop the drain.
    /// Returns the number of commands processed.
    pub fn process_commands(&mut self, commands: &mut CommandConsumer) -> usize {
        let mut processed = 0;
        while let Some(command) = commands.try_pop() {
            let _ = self.execute(command);
            processed += 1;
        }
        processed
    }

    /// Stop the transport and drop every scheduled callback
    pub fn shutdown(&mut self) {
        self.pause();
        self.transport.shutdown();
    }

    // --- Internals ---

    fn trigger_handler(&self) -> TriggerHandler {
        let bank = Arc::clone(&self.bank);
        Arc::new(move |instrument, time| bank.trigger(instrument, time))
    }

    fn install(&self, grid: &PatternGrid) -> SequencerResult<()> {
        let events = self.scheduler.build(grid);
        self.scheduler
            .install(&self.transport, &events, self.trigger_handler())
    }

    fn queue_preview(&self, instrument: Instrument) {
        let bank = Arc::clone(&self.bank);
        self.transport
            .schedule_once(Box::new(move |time| bank.preview(instrument, time)));
        tracing::debug!(%instrument, "preview queued");
    }

    fn reject(&mut self, err: SequencerError) -> SequencerError {
        tracing::warn!(error = %err, "command rejected");
        self.notify(Notification::CommandRejected(err.to_string()));
        err
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(producer) = self.notifications.as_mut() {
            if producer.try_push(notification).is_err() {
                tracing::warn!("notification queue full, notification dropped");
            }
        }
    }
}

impl Drop for SequencerController {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}
