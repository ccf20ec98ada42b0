//! Change notifications to external observers.

use std::fmt;

use parking_lot::Mutex;
use tracing::info;

/// What changed at a uri.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyType {
    /// A thumbnail became available for the first time
    ThumbAdd,
    /// An existing thumbnail was regenerated
    ThumbUpdate,
}

impl fmt::Display for NotifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyType::ThumbAdd => f.write_str("thumb_add"),
            NotifyType::ThumbUpdate => f.write_str("thumb_update"),
        }
    }
}

/// Transport for change notifications.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, uri: &str, kind: NotifyType);
}

/// Emits each notification as an `info!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl ChangeNotifier for TracingNotifier {
    fn notify(&self, uri: &str, kind: NotifyType) {
        info!(uri, kind = %kind, "Change notification");
    }
}

/// Records notifications in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<(String, NotifyType)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, NotifyType)> {
        self.events.lock().clone()
    }

    /// Notifications sent to `uri`.
    pub fn events_for(&self, uri: &str) -> Vec<NotifyType> {
        self.events
            .lock()
            .iter()
            .filter(|(u, _)| u == uri)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ChangeNotifier for CollectingNotifier {
    fn notify(&self, uri: &str, kind: NotifyType) {
        self.events.lock().push((uri.to_string(), kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_notifier_filters_by_uri() {
        let notifier = CollectingNotifier::new();
        notifier.notify("mediathumb://photo/1", NotifyType::ThumbAdd);
        notifier.notify("mediathumb://photo/2", NotifyType::ThumbUpdate);
        notifier.notify("mediathumb://photo/1", NotifyType::ThumbUpdate);

        assert_eq!(
            notifier.events_for("mediathumb://photo/1"),
            vec![NotifyType::ThumbAdd, NotifyType::ThumbUpdate]
        );
        assert_eq!(notifier.events().len(), 3);
        notifier.clear();
        assert!(notifier.events().is_empty());
    }
}
