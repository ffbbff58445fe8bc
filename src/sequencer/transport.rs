// Transport - Loop clock and trigger callback table
// Runs a one-bar loop in ticks, driven by the audio clock through `TransportClock`

use super::timeline::{Tempo, TempoRamp, TempoRange};
use crate::config::SequencerConfig;
use crate::error::{SequencerError, SequencerResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback fired every loop cycle, given the audio-clock time of the firing in seconds
pub type LoopCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Callback fired once on the next clock block
pub type OneShotCallback = Box<dyn FnOnce(f64) + Send>;

/// Maximum block length evaluated at a single tempo while a ramp is active
const RAMP_SEGMENT_FRAMES: usize = 32;

/// Firings preallocated per clock handle
const DUE_CAPACITY: usize = 64;

/// Transport state (running/stopped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// Fixed clock parameters, derived once from the config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSettings {
    pub ticks_per_bar: u32,
    pub ticks_per_beat: u32,
    pub sample_rate: f64,
    pub ramp_seconds: f64,
    pub tempo_range: TempoRange,
}

impl TransportSettings {
    pub fn from_config(config: &SequencerConfig) -> Self {
        Self {
            ticks_per_bar: config.ticks_per_bar,
            ticks_per_beat: config.ticks_per_beat(),
            sample_rate: config.sample_rate,
            ramp_seconds: config.ramp_ms / 1000.0,
            tempo_range: TempoRange::new(config.min_bpm, config.max_bpm),
        }
    }
}

#[derive(Clone)]
struct ScheduledLoop {
    offset_ticks: u32,
    callback: LoopCallback,
}

/// Immutable set of loop callbacks
///
/// The clock reads a whole table per block; edits build a replacement table and swap it in.
#[derive(Clone, Default)]
pub struct ScheduleTable {
    loops: Vec<ScheduledLoop>,
}

impl ScheduleTable {
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Registered offsets in registration order
    pub fn offsets(&self) -> Vec<u32> {
        self.loops.iter().map(|l| l.offset_ticks).collect()
    }
}

/// Pending edit of the loop table, committed only if the whole edit succeeds
pub struct ScheduleEditor {
    table: ScheduleTable,
    loop_ticks: u32,
}

impl ScheduleEditor {
    /// Drop every loop callback registered so far
    pub fn cancel_all(&mut self) {
        self.table.loops.clear();
    }

    /// Register `callback` to fire each cycle when the clock reaches `offset_ticks`
    pub fn schedule_loop(&mut self, offset_ticks: u32, callback: LoopCallback) -> SequencerResult<()> {
        if offset_ticks >= self.loop_ticks {
            return Err(SequencerError::OffsetOutOfRange {
                offset: offset_ticks,
                loop_ticks: self.loop_ticks,
            });
        }
        self.table.loops.push(ScheduledLoop {
            offset_ticks,
            callback,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

struct ClockState {
    position_ticks: f64,
    frames: u64,
    ramp: TempoRamp,
}

impl ClockState {
    fn audio_time(&self, sample_rate: f64) -> f64 {
        self.frames as f64 / sample_rate
    }
}

struct TransportShared {
    settings: TransportSettings,
    running: AtomicBool,
    clock: Mutex<ClockState>,
    schedule: Mutex<Arc<ScheduleTable>>,
    one_shots: Mutex<Vec<OneShotCallback>>,
}

/// Ticks from `position` forward to `offset`, wrapping at the loop end
fn ticks_until(position: f64, offset: f64, loop_ticks: f64) -> f64 {
    if offset >= position {
        offset - position
    } else {
        loop_ticks - position + offset
    }
}

/// Transport controller
///
/// Owns the clock state and the callback table. The audio thread gets a
/// [`TransportClock`] handle that only advances time.
pub struct Transport {
    shared: Arc<TransportShared>,
}

impl Transport {
    /// Create a stopped transport at bar start, settled on `initial_tempo`
    pub fn new(settings: TransportSettings, initial_tempo: Tempo) -> Self {
        Self {
            shared: Arc::new(TransportShared {
                settings,
                running: AtomicBool::new(false),
                clock: Mutex::new(ClockState {
                    position_ticks: 0.0,
                    frames: 0,
                    ramp: TempoRamp::settled(initial_tempo),
                }),
                schedule: Mutex::new(Arc::new(ScheduleTable::default())),
                one_shots: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create from a validated config, starting at the default tempo
    pub fn from_config(config: &SequencerConfig) -> SequencerResult<Self> {
        config.validate()?;
        let settings = TransportSettings::from_config(config);
        let tempo = settings.tempo_range.check(config.default_bpm)?;
        Ok(Self::new(settings, tempo))
    }

    /// Handle for the audio thread
    pub fn clock(&self) -> TransportClock {
        TransportClock {
            shared: Arc::clone(&self.shared),
            table: self.schedule(),
            pending_frames: 0,
            one_shots: Vec::new(),
            due: Vec::with_capacity(DUE_CAPACITY),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.shared.settings
    }

    /// Loop length in ticks (one bar)
    pub fn loop_ticks(&self) -> u32 {
        self.shared.settings.ticks_per_bar
    }

    /// Start the clock (no-op if already running)
    pub fn start(&self) {
        if !self.shared.running.swap(true, Ordering::AcqRel) {
            tracing::debug!("transport started");
        }
    }

    /// Halt the clock at its current position (no-op if already stopped)
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            tracing::debug!("transport stopped");
        }
    }

    pub fn state(&self) -> TransportState {
        if self.shared.running.load(Ordering::Acquire) {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Move the playhead back to bar start
    pub fn rewind(&self) {
        self.shared.clock.lock().position_ticks = 0.0;
    }

    /// Current playhead within the loop, in ticks
    pub fn position_ticks(&self) -> f64 {
        self.shared.clock.lock().position_ticks
    }

    /// Audio-clock time in seconds
    pub fn audio_time(&self) -> f64 {
        self.shared
            .clock
            .lock()
            .audio_time(self.shared.settings.sample_rate)
    }

    /// Ramp toward a new tempo
    ///
    /// Fails with `InvalidTempo` for non-finite values or values outside the
    /// configured range; the tempo is left unchanged in that case.
    pub fn set_tempo(&self, bpm: f64) -> SequencerResult<Tempo> {
        let tempo = self.shared.settings.tempo_range.check(bpm)?;
        self.shared
            .clock
            .lock()
            .ramp
            .retarget(tempo, self.shared.settings.ramp_seconds);
        tracing::debug!(%tempo, "tempo ramp started");
        Ok(tempo)
    }

    /// Tempo the transport is set to (the ramp target)
    pub fn tempo(&self) -> Tempo {
        self.shared.clock.lock().ramp.target()
    }

    /// Instantaneous BPM, mid-ramp values included
    pub fn current_bpm(&self) -> f64 {
        self.shared.clock.lock().ramp.current_bpm()
    }

    /// Atomically edit the loop table
    ///
    /// The editor starts from the current table. The result replaces it only if
    /// `edit` succeeds, and the clock never observes a half-applied edit: a block
    /// already in progress keeps the table it started with.
    pub fn reschedule<F>(&self, edit: F) -> SequencerResult<()>
    where
        F: FnOnce(&mut ScheduleEditor) -> SequencerResult<()>,
    {
        let mut slot = self.shared.schedule.lock();
        let mut editor = ScheduleEditor {
            table: ScheduleTable::clone(&slot),
            loop_ticks: self.loop_ticks(),
        };
        edit(&mut editor)?;
        *slot = Arc::new(editor.table);
        Ok(())
    }

    /// Clear all loop callbacks; running state is untouched
    pub fn cancel_scheduled(&self) {
        *self.shared.schedule.lock() = Arc::new(ScheduleTable::default());
    }

    /// Register a loop callback at `offset_ticks`
    pub fn schedule_loop(&self, offset_ticks: u32, callback: LoopCallback) -> SequencerResult<()> {
        self.reschedule(|editor| editor.schedule_loop(offset_ticks, callback))
    }

    /// Snapshot of the installed loop table
    pub fn schedule(&self) -> Arc<ScheduleTable> {
        Arc::clone(&self.shared.schedule.lock())
    }

    /// Queue a callback for the start of the next clock block, running or not
    pub fn schedule_once(&self, callback: OneShotCallback) {
        self.shared.one_shots.lock().push(callback);
    }

    /// Drop one-shots that have not fired yet
    pub fn cancel_one_shots(&self) -> usize {
        let mut one_shots = self.shared.one_shots.lock();
        let dropped = one_shots.len();
        one_shots.clear();
        dropped
    }

    pub fn pending_one_shots(&self) -> usize {
        self.shared.one_shots.lock().len()
    }

    /// Stop and drop every registered callback
    pub fn shutdown(&self) {
        self.stop();
        self.cancel_scheduled();
        self.cancel_one_shots();
    }
}

/// Audio-thread handle that drives the transport
///
/// Never blocks on the control side: every lock is taken with `try_lock`. A
/// contended loop table falls back to the last table seen, contended one-shots
/// wait for the next block, and a contended clock carries the block's frames
/// over to the next call.
pub struct TransportClock {
    shared: Arc<TransportShared>,
    table: Arc<ScheduleTable>,
    pending_frames: usize,
    one_shots: Vec<OneShotCallback>,
    due: Vec<(f64, LoopCallback)>,
}

impl TransportClock {
    /// Advance the clock by `frames` audio frames and fire every callback due in the block
    ///
    /// Loop callbacks receive the interpolated audio time at which their offset is
    /// crossed. One-shots fire with the block start time. Returns the number of
    /// callbacks fired.
    pub fn advance(&mut self, frames: usize) -> usize {
        self.pending_frames += frames;

        let shared = &*self.shared;
        let settings = shared.settings;
        let loop_ticks = settings.ticks_per_bar as f64;

        let Some(mut clock) = shared.clock.try_lock() else {
            return 0;
        };
        let frames = std::mem::take(&mut self.pending_frames);

        if let Some(table) = shared.schedule.try_lock() {
            if !Arc::ptr_eq(&self.table, &table) {
                self.table = Arc::clone(&table);
            }
        }
        if let Some(mut pending) = shared.one_shots.try_lock() {
            std::mem::swap(&mut *pending, &mut self.one_shots);
        }
        let running = shared.running.load(Ordering::Acquire);

        let block_start = clock.audio_time(settings.sample_rate);
        let mut remaining = frames;

        while remaining > 0 {
            let segment = if clock.ramp.is_active() {
                remaining.min(RAMP_SEGMENT_FRAMES)
            } else {
                remaining
            };
            let segment_start = clock.audio_time(settings.sample_rate);
            let seconds = segment as f64 / settings.sample_rate;

            if running {
                let rate = clock.ramp.current().ticks_per_second(settings.ticks_per_beat);
                let delta = rate * seconds;

                for entry in &self.table.loops {
                    let mut until =
                        ticks_until(clock.position_ticks, entry.offset_ticks as f64, loop_ticks);
                    while until < delta {
                        self.due
                            .push((segment_start + until / rate, Arc::clone(&entry.callback)));
                        until += loop_ticks;
                    }
                }

                clock.position_ticks = (clock.position_ticks + delta) % loop_ticks;
            }

            clock.frames += segment as u64;
            clock.ramp.advance(seconds);
            remaining -= segment;
        }
        drop(clock);

        let fired = self.one_shots.len() + self.due.len();
        for one_shot in self.one_shots.drain(..) {
            one_shot(block_start);
        }

        self.due.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (time, callback) in self.due.drain(..) {
            callback(time);
        }

        fired
    }

    /// Audio-clock time in seconds
    pub fn audio_time(&self) -> f64 {
        self.shared
            .clock
            .lock()
            .audio_time(self.shared.settings.sample_rate)
    }
}
