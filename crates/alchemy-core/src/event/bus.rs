// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{Mutex, PoisonError};

/// Broadcasts events of type `T` to any number of subscribers.
///
/// Each call to [`subscribe`](EventBus::subscribe) opens an unbounded flume
/// channel. Subscribers that drop their receiver are pruned on the next
/// publish.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        log::debug!("Generic EventBus initialized.");
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Opens a new subscription receiving every event published from now on.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Sends `event` to every live subscriber.
    pub fn publish(&self, event: T) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        log::trace!("Publishing an event to {} subscriber(s).", subscribers.len());
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers, as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Started,
        Progress(u32),
        Stopped,
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Started);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_receives_events_in_order() {
        let bus = EventBus::<TestEvent>::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(TestEvent::Started);
        bus.publish(TestEvent::Progress(1));
        bus.publish(TestEvent::Stopped);

        for receiver in [&first, &second] {
            let received: Vec<_> = receiver.drain().collect();
            assert_eq!(
                received,
                vec![TestEvent::Started, TestEvent::Progress(1), TestEvent::Stopped]
            );
        }
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Started);
        let receiver = bus.subscribe();
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::<TestEvent>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(TestEvent::Started);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(TestEvent::Started));
    }

    #[test]
    fn publish_from_thread() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let receiver = bus.subscribe();
        let publisher = Arc::clone(&bus);

        thread::spawn(move || publisher.publish(TestEvent::Progress(7)))
            .join()
            .expect("publisher thread panicked");

        assert_eq!(receiver.try_recv(), Ok(TestEvent::Progress(7)));
    }
}
