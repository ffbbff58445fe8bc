// Scheduler - Converts a pattern grid into loop trigger events
// and installs them on the transport in one atomic swap

use super::pattern::{Instrument, PatternGrid};
use super::transport::{LoopCallback, Transport};
use crate::error::{SequencerError, SequencerResult};
use std::sync::Arc;

/// Callback invoked for every due trigger with the instrument and its audio-clock time
pub type TriggerHandler = Arc<dyn Fn(Instrument, f64) + Send + Sync>;

/// A trigger at a fixed tick offset within one loop cycle
///
/// Derived from a grid snapshot; never stored independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerEvent {
    pub offset_ticks: u32,
    pub instrument: Instrument,
}

/// Grid → event translation for a fixed loop length and subdivision count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    loop_ticks: u32,
    subdivisions: u32,
    step_ticks: u32,
}

impl Scheduler {
    /// Fails with `NonIntegralSubdivision` unless `subdivisions` evenly divides a
    /// non-empty loop
    pub fn new(loop_ticks: u32, subdivisions: u32) -> SequencerResult<Self> {
        if loop_ticks == 0 || subdivisions == 0 || loop_ticks % subdivisions != 0 {
            return Err(SequencerError::NonIntegralSubdivision {
                loop_ticks,
                subdivisions,
            });
        }
        Ok(Self {
            loop_ticks,
            subdivisions,
            step_ticks: loop_ticks / subdivisions,
        })
    }

    pub fn loop_ticks(&self) -> u32 {
        self.loop_ticks
    }

    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    /// Ticks between two consecutive steps
    pub fn step_ticks(&self) -> u32 {
        self.step_ticks
    }

    /// Step index containing a playhead position
    pub fn step_at(&self, position_ticks: f64) -> usize {
        (position_ticks.max(0.0) as u32 / self.step_ticks).min(self.subdivisions - 1) as usize
    }

    /// Trigger events for every active cell, row-major
    ///
    /// Offsets are integer multiples of the step length, so building the same grid
    /// twice always yields identical events. Rows without an instrument and steps
    /// past the configured subdivision count produce nothing.
    pub fn build(&self, grid: &PatternGrid) -> Vec<TriggerEvent> {
        grid.active_cells()
            .filter(|(_, col)| *col < self.subdivisions as usize)
            .filter_map(|(row, col)| {
                Instrument::from_row(row).map(|instrument| TriggerEvent {
                    offset_ticks: self.step_ticks * col as u32,
                    instrument,
                })
            })
            .collect()
    }

    /// Replace everything registered on the transport with `events`
    ///
    /// Cancel and register happen in a single table swap, so the clock sees either
    /// the old set or the complete new one.
    pub fn install(
        &self,
        transport: &Transport,
        events: &[TriggerEvent],
        on_trigger: TriggerHandler,
    ) -> SequencerResult<()> {
        transport.reschedule(|schedule| {
            schedule.cancel_all();
            for event in events {
                let instrument = event.instrument;
                let handler = Arc::clone(&on_trigger);
                let callback: LoopCallback = Arc::new(move |time| handler(instrument, time));
                schedule.schedule_loop(event.offset_ticks, callback)?;
            }
            Ok(())
        })?;

        tracing::debug!(events = events.len(), "schedule installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::timeline::TempoRange;
    use crate::sequencer::transport::TransportSettings;
    use parking_lot::Mutex;

    fn transport() -> Transport {
        let settings = TransportSettings {
            ticks_per_bar: 192,
            ticks_per_beat: 48,
            sample_rate: 48000.0,
            ramp_seconds: 0.1,
            tempo_range: TempoRange::default(),
        };
        Transport::new(settings, TempoRange::default().check(120.0).unwrap())
    }

    #[test]
    fn test_non_integral_subdivision() {
        assert!(matches!(
            Scheduler::new(192, 10),
            Err(SequencerError::NonIntegralSubdivision { loop_ticks: 192, subdivisions: 10 })
        ));
        assert!(Scheduler::new(192, 0).is_err());
        assert!(matches!(
            Scheduler::new(0, 16),
            Err(SequencerError::NonIntegralSubdivision { loop_ticks: 0, subdivisions: 16 })
        ));
        assert_eq!(Scheduler::new(192, 16).unwrap().step_ticks(), 12);
    }

    #[test]
    fn test_build_offsets() {
        let scheduler = Scheduler::new(192, 16).unwrap();
        let grid = PatternGrid::parse(&[
            "................",
            "x...............",
            "....x.......x...",
            "x.......x.......",
        ])
        .unwrap();

        let events = scheduler.build(&grid);
        assert_eq!(
            events,
            vec![
                TriggerEvent { offset_ticks: 0, instrument: Instrument::ClosedHat },
                TriggerEvent { offset_ticks: 48, instrument: Instrument::Snare },
                TriggerEvent { offset_ticks: 144, instrument: Instrument::Snare },
                TriggerEvent { offset_ticks: 0, instrument: Instrument::Kick },
                TriggerEvent { offset_ticks: 96, instrument: Instrument::Kick },
            ]
        );
    }

    #[test]
    fn test_empty_grid_builds_nothing() {
        let scheduler = Scheduler::new(192, 16).unwrap();
        assert!(scheduler.build(&PatternGrid::default_grid(4, 16)).is_empty());
    }

    #[test]
    fn test_step_at() {
        let scheduler = Scheduler::new(192, 16).unwrap();
        assert_eq!(scheduler.step_at(0.0), 0);
        assert_eq!(scheduler.step_at(11.9), 0);
        assert_eq!(scheduler.step_at(12.0), 1);
        assert_eq!(scheduler.step_at(191.9), 15);
    }

    #[test]
    fn test_install_replaces_previous_events() {
        let scheduler = Scheduler::new(192, 16).unwrap();
        let transport = transport();
        let handler: TriggerHandler = Arc::new(|_, _| {});

        let empty = PatternGrid::default_grid(4, 16);
        let first = scheduler.build(&empty.toggle(0, 0).unwrap());
        scheduler.install(&transport, &first, Arc::clone(&handler)).unwrap();
        assert_eq!(transport.schedule().offsets(), vec![0]);

        let grid = empty.toggle(3, 4).unwrap().toggle(3, 8).unwrap();
        let second = scheduler.build(&grid);
        scheduler.install(&transport, &second, handler).unwrap();

        assert_eq!(transport.schedule().offsets(), vec![48, 96]);
    }

    #[test]
    fn test_installed_events_trigger_instruments() {
        let scheduler = Scheduler::new(192, 16).unwrap();
        let transport = transport();
        let mut clock = transport.clock();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hits);
        let handler: TriggerHandler =
            Arc::new(move |instrument, time| sink.lock().push((instrument, time)));

        let grid = PatternGrid::default_grid(4, 16).toggle(2, 4).unwrap();
        scheduler.install(&transport, &scheduler.build(&grid), handler).unwrap();
        transport.start();
        clock.advance(48000);

        assert_eq!(*hits.lock(), vec![(Instrument::Snare, 0.5)]);
    }
}
