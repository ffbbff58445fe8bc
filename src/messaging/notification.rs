// State-change notifications - sequencer → UI

use crate::sequencer::controller::PlaybackState;
use crate::sequencer::pattern::PatternGrid;
use crate::sequencer::timeline::Tempo;
use std::fmt;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Something the UI should redraw or report
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PlaybackChanged(PlaybackState),
    TempoChanged(Tempo),
    /// The grid was replaced; carries the new snapshot
    PatternChanged(PatternGrid),
    PresetLoaded { name: String, tempo: Tempo },
    Reset,
    /// A command failed and left the state untouched
    CommandRejected(String),
}

impl Notification {
    pub fn level(&self) -> NotificationLevel {
        match self {
            Notification::CommandRejected(_) => NotificationLevel::Error,
            _ => NotificationLevel::Info,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level() == NotificationLevel::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::PlaybackChanged(state) => write!(f, "playback {:?}", state),
            Notification::TempoChanged(tempo) => write!(f, "tempo {}", tempo),
            Notification::PatternChanged(grid) => {
                write!(f, "pattern changed ({} active steps)", grid.active_count())
            }
            Notification::PresetLoaded { name, tempo } => {
                write!(f, "preset '{}' loaded at {}", name, tempo)
            }
            Notification::Reset => f.write_str("reset"),
            Notification::CommandRejected(message) => write!(f, "command rejected: {}", message),
        }
    }
}
