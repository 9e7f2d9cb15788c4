use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use super::selector::Selector;
use crate::client::types::{Message, ReceiveTimeout};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO of pending messages with wakeups for waiting receivers
///
/// Backs a queue destination (shared by competing consumers) or a single
/// topic subscription.
#[derive(Default)]
pub(crate) struct MessageQueue {
    messages: Mutex<VecDeque<Message>>,
    arrivals: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: Message) {
        lock(&self.messages).push_back(message);
        self.arrivals.notify_waiters();
    }

    /// Put unacknowledged messages back at the head, preserving their order
    pub fn requeue_front(&self, returned: Vec<Message>) {
        if returned.is_empty() {
            return;
        }
        {
            let mut messages = lock(&self.messages);
            for mut message in returned.into_iter().rev() {
                message.redelivered = true;
                messages.push_front(message);
            }
        }
        self.arrivals.notify_waiters();
    }

    pub fn len(&self) -> usize {
        lock(&self.messages).len()
    }

    pub fn clear(&self) {
        lock(&self.messages).clear();
    }

    /// Remove and return the first message accepted by `selector`
    pub fn take_matching(&self, selector: Option<&Selector>) -> Option<Message> {
        let mut messages = lock(&self.messages);
        let index = messages
            .iter()
            .position(|message| selector.map_or(true, |s| s.matches(message)))?;
        messages.remove(index)
    }

    /// Copy of the messages currently visible through `selector`
    pub fn snapshot(&self, selector: Option<&Selector>) -> Vec<Message> {
        lock(&self.messages)
            .iter()
            .filter(|message| selector.map_or(true, |s| s.matches(message)))
            .cloned()
            .collect()
    }

    /// Wake every waiting receiver so it can re-check its closed flag
    pub fn wake_all(&self) {
        self.arrivals.notify_waiters();
    }

    /// Wait for a matching message
    ///
    /// Returns `None` when the timeout elapses or `closed` is raised.
    pub async fn receive(
        &self,
        selector: Option<&Selector>,
        timeout: ReceiveTimeout,
        closed: &AtomicBool,
    ) -> Option<Message> {
        let deadline = timeout.as_duration().map(|wait| Instant::now() + wait);

        loop {
            // Register for wakeups before checking so a push between the
            // check and the await is not missed.
            let mut notified = pin!(self.arrivals.notified());
            notified.as_mut().enable();

            if closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(message) = self.take_matching(selector) {
                return Some(message);
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if time::timeout_at(deadline, notified).await.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}
