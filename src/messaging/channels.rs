// Lock-free SPSC queues between the UI, the sequencer and the audio clock

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

pub type CommandProducer = HeapProd<Command>;
pub type CommandConsumer = HeapCons<Command>;

pub type NotificationProducer = HeapProd<Notification>;
pub type NotificationConsumer = HeapCons<Notification>;

/// Heap-backed single-producer single-consumer queue of `capacity` items
pub fn bounded<T>(capacity: usize) -> (HeapProd<T>, HeapCons<T>) {
    HeapRb::<T>::new(capacity).split()
}

/// UI → sequencer
pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    bounded(capacity)
}

/// Sequencer → UI
pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    bounded(capacity)
}

/// Queue a command, logging and returning false when the queue is full
pub fn send_command(commands: &mut CommandProducer, command: Command) -> bool {
    match commands.try_push(command) {
        Ok(()) => true,
        Err(dropped) => {
            tracing::warn!(command = ?dropped, "command queue full, command dropped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Consumer;

    #[test]
    fn test_command_channel_preserves_order() {
        let (mut tx, mut rx) = create_command_channel(4);
        assert!(send_command(&mut tx, Command::SetTempo(120.0)));
        assert!(send_command(&mut tx, Command::Play));

        assert_eq!(rx.try_pop(), Some(Command::SetTempo(120.0)));
        assert_eq!(rx.try_pop(), Some(Command::Play));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_full_command_channel_drops() {
        let (mut tx, mut rx) = create_command_channel(1);
        assert!(send_command(&mut tx, Command::Play));
        assert!(!send_command(&mut tx, Command::Pause));

        assert_eq!(rx.try_pop(), Some(Command::Play));
        assert_eq!(rx.try_pop(), None);
    }
}
