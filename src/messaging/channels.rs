// Communication channels lock-free

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_notification_channel_round_trip() {
        let (mut tx, mut rx) = create_notification_channel(8);
        tx.try_push(Notification::StepAdvanced(3)).unwrap();
        assert_eq!(rx.try_pop(), Some(Notification::StepAdvanced(3)));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_command_channel_bounded() {
        let (mut tx, _rx) = create_command_channel(1);
        assert!(tx.try_push(Command::Stop).is_ok());
        assert!(tx.try_push(Command::Stop).is_err());
    }
}
