//! Foreground/background signal consumed by sessions.
//!
//! A session subscribes with a [`watch::Receiver<Visibility>`] and drops the
//! receiver when it is torn down. [`VisibilitySignal`] is a ready-made source
//! for hosts that learn about visibility changes imperatively.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Whether the consuming context is currently foregrounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Foregrounded.
    #[default]
    Visible,
    /// Backgrounded.
    Hidden,
}

impl Visibility {
    /// Returns `true` when hidden.
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }
}

impl From<bool> for Visibility {
    /// Maps a "hidden" flag to a visibility value.
    fn from(hidden: bool) -> Self {
        if hidden { Self::Hidden } else { Self::Visible }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible => write!(f, "visible"),
            Self::Hidden => write!(f, "hidden"),
        }
    }
}

/// Broadcasts visibility transitions to any number of sessions.
#[derive(Debug)]
pub struct VisibilitySignal {
    tx: watch::Sender<Visibility>,
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new(Visibility::Visible)
    }
}

impl VisibilitySignal {
    /// Create a signal with the given initial value.
    pub fn new(initial: Visibility) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Subscribe to transitions.
    pub fn subscribe(&self) -> watch::Receiver<Visibility> {
        self.tx.subscribe()
    }

    /// Report the consumer as hidden.
    pub fn hide(&self) {
        self.set(Visibility::Hidden);
    }

    /// Report the consumer as visible.
    pub fn show(&self) {
        self.set(Visibility::Visible);
    }

    /// Report a visibility value; repeated values are not re-broadcast.
    pub fn set(&self, visibility: Visibility) {
        self.tx.send_if_modified(|current| {
            if *current == visibility {
                return false;
            }
            *current = visibility;
            true
        });
    }

    /// The current value.
    pub fn get(&self) -> Visibility {
        *self.tx.borrow()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hidden_flag() {
        assert_eq!(Visibility::from(true), Visibility::Hidden);
        assert_eq!(Visibility::from(false), Visibility::Visible);
        assert!(Visibility::Hidden.is_hidden());
        assert_eq!(Visibility::Hidden.to_string(), "hidden");
    }

    #[test]
    fn test_duplicate_values_are_not_rebroadcast() {
        let signal = VisibilitySignal::default();
        let mut rx = signal.subscribe();
        assert!(!rx.has_changed().expect("sender alive"));

        signal.show();
        assert!(!rx.has_changed().expect("sender alive"));

        signal.hide();
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), Visibility::Hidden);
        assert_eq!(signal.get(), Visibility::Hidden);
    }

    #[test]
    fn test_subscriber_count_tracks_receivers() {
        let signal = VisibilitySignal::default();
        assert_eq!(signal.subscriber_count(), 0);
        let rx = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 1);
        drop(rx);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
