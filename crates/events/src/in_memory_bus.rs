//! In-memory notification bus for tests/dev.

use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use fabdesk_core::NotificationId;

use crate::{Notification, NotificationSink};

/// Receiving end of a bus subscription.
///
/// Each subscription gets a copy of every notification published after it was
/// created.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Notification>,
}

impl Subscription {
    /// Try to receive a notification without blocking.
    pub fn try_recv(&self) -> Result<Notification, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a notification.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out; disconnected subscribers are dropped on publish
/// - Keeps the most recent notifications, with their read flag
#[derive(Debug)]
pub struct InMemoryNotificationBus {
    subscribers: Mutex<Vec<mpsc::Sender<Notification>>>,
    history: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl InMemoryNotificationBus {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        Subscription { receiver: rx }
    }

    /// Most recent notifications, newest first.
    pub fn recent(&self) -> Vec<Notification> {
        match self.history.lock() {
            Ok(h) => h.iter().rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Unread notifications, newest first.
    pub fn unread(&self) -> Vec<Notification> {
        match self.history.lock() {
            Ok(h) => h.iter().rev().filter(|n| !n.is_read).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn unread_count(&self) -> usize {
        match self.history.lock() {
            Ok(h) => h.iter().filter(|n| !n.is_read).count(),
            Err(_) => 0,
        }
    }

    /// Returns `false` when the notification is no longer in history.
    pub fn mark_read(&self, id: NotificationId) -> bool {
        let Ok(mut history) = self.history.lock() else {
            return false;
        };
        match history.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    /// Marks everything read and returns how many were unread.
    pub fn mark_all_read(&self) -> usize {
        let Ok(mut history) = self.history.lock() else {
            return 0;
        };
        let mut updated = 0;
        for n in history.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            updated += 1;
        }
        updated
    }

    /// Returns `false` when the notification is no longer in history.
    pub fn remove(&self, id: NotificationId) -> bool {
        let Ok(mut history) = self.history.lock() else {
            return false;
        };
        let before = history.len();
        history.retain(|n| n.id != id);
        history.len() != before
    }
}

impl Default for InMemoryNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for InMemoryNotificationBus {
    fn notify(&self, notification: Notification) {
        if let Ok(mut history) = self.history.lock() {
            if self.capacity > 0 {
                if history.len() == self.capacity {
                    history.pop_front();
                }
                history.push_back(notification.clone());
            }
        }

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| tx.send(notification.clone()).is_ok());
        }
    }
}
