//! Engine notification hub for progress/log delivery.
//!
//! Architecture:
//! - Sessions subscribe with callbacks and retain the returned token
//! - Engine implementations emit notices, callbacks run synchronously
//! - unsubscribe(token) removes exactly one handler; cleanup paths call it
//!
//! Notices carry a free-form `tag` naming the originating operation. The tag
//! is for logging only: a shared engine interleaves notices from concurrent
//! sessions and makes no correctness guarantee about who receives what.

use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A notification emitted by the media engine
#[derive(Debug, Clone)]
pub enum EngineNotice {
    /// Operation progress, `ratio` in `[0.0, 1.0]`
    Progress { tag: String, ratio: f32 },
    /// A diagnostic line from the engine
    Log { tag: String, line: String },
}

/// Handle returned by subscribe; required for unsubscribe.
///
/// Deliberately not `Copy`: a token is redeemed once.
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

type Handler = Arc<dyn Fn(&EngineNotice) + Send + Sync>;

/// Token-based pub/sub hub for engine notices.
///
/// Handlers are invoked synchronously from the engine's notification path,
/// in subscription order.
pub struct NotificationHub {
    next_token: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler)>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("handlers", &self.handlers.read().map(|h| h.len()).unwrap_or(0))
            .finish()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to all notices.
    ///
    /// The callback is invoked synchronously on every emit until the returned
    /// token is passed to [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&EngineNotice) + Send + Sync + 'static,
    {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .expect("lock")
            .push((id, Arc::new(callback)));
        trace!("Notification handler {} subscribed", id);
        SubscriptionToken(id)
    }

    /// Remove the handler registered under `token`.
    ///
    /// Unknown/stale tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.handlers
            .write()
            .expect("lock")
            .retain(|(id, _)| *id != token.0);
        trace!("Notification handler {} unsubscribed", token.0);
    }

    /// Emit a notice to every current subscriber, synchronously.
    pub fn emit(&self, notice: &EngineNotice) {
        // Clone handlers out of the lock so a callback may subscribe/unsubscribe
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .expect("lock")
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            handler(notice);
        }
    }

    /// Convenience: emit a progress notice
    pub fn progress(&self, tag: &str, ratio: f32) {
        self.emit(&EngineNotice::Progress {
            tag: tag.to_string(),
            ratio,
        });
    }

    /// Convenience: emit a log notice
    pub fn log(&self, tag: &str, line: &str) {
        self.emit(&EngineNotice::Log {
            tag: tag.to_string(),
            line: line.to_string(),
        });
    }

    /// Current subscriber count
    pub fn len(&self) -> usize {
        self.handlers.read().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
