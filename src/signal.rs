//! Turns raw UI gestures into aggregator triggers.
//!
//! Scroll position reports arrive continuously while the list sits at the
//! bottom. Only the edge from "not at end" to "at end" becomes a
//! [`Trigger::LoadNext`]; the edge is re-armed when the list scrolls away
//! from the end or is refreshed. While a refresh is in flight, end-of-list
//! edges are swallowed entirely.

/// Gesture reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiSignal {
    PullToRefresh,
    Scrolled { at_end: bool },
}

/// Aggregator operation requested by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Refresh,
    LoadNext,
}

#[derive(Debug, Default)]
pub struct SignalBridge {
    at_end: bool,
}

impl SignalBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one gesture through the bridge.
    ///
    /// `refreshing` tells whether a refresh is in flight for the active key.
    pub fn observe(&mut self, signal: UiSignal, refreshing: bool) -> Option<Trigger> {
        match signal {
            UiSignal::PullToRefresh => {
                self.at_end = false;
                Some(Trigger::Refresh)
            }
            UiSignal::Scrolled { at_end: false } => {
                self.at_end = false;
                None
            }
            UiSignal::Scrolled { at_end: true } => {
                if self.at_end {
                    return None;
                }
                self.at_end = true;
                if refreshing {
                    tracing::debug!("Refresh in flight, ignoring end-of-list signal");
                    return None;
                }
                Some(Trigger::LoadNext)
            }
        }
    }

    /// Forget the edge state (after switching tabs, the new list starts at the top).
    pub fn reset(&mut self) {
        self.at_end = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT_END: UiSignal = UiSignal::Scrolled { at_end: true };
    const AWAY: UiSignal = UiSignal::Scrolled { at_end: false };

    #[test]
    fn test_repeated_end_signals_trigger_once() {
        let mut bridge = SignalBridge::new();
        assert_eq!(bridge.observe(AT_END, false), Some(Trigger::LoadNext));
        assert_eq!(bridge.observe(AT_END, false), None);
        assert_eq!(bridge.observe(AT_END, false), None);
    }

    #[test]
    fn test_scrolling_away_rearms() {
        let mut bridge = SignalBridge::new();
        bridge.observe(AT_END, false);
        assert_eq!(bridge.observe(AWAY, false), None);
        assert_eq!(bridge.observe(AT_END, false), Some(Trigger::LoadNext));
    }

    #[test]
    fn test_end_suppressed_while_refreshing() {
        let mut bridge = SignalBridge::new();
        assert_eq!(bridge.observe(AT_END, true), None);
        // Still at end after the refresh lands: no trigger until the edge re-arms
        assert_eq!(bridge.observe(AT_END, false), None);
        bridge.observe(AWAY, false);
        assert_eq!(bridge.observe(AT_END, false), Some(Trigger::LoadNext));
    }

    #[test]
    fn test_pull_to_refresh_always_triggers_and_rearms() {
        let mut bridge = SignalBridge::new();
        bridge.observe(AT_END, false);
        assert_eq!(
            bridge.observe(UiSignal::PullToRefresh, false),
            Some(Trigger::Refresh)
        );
        assert_eq!(
            bridge.observe(UiSignal::PullToRefresh, true),
            Some(Trigger::Refresh)
        );
        assert_eq!(bridge.observe(AT_END, false), Some(Trigger::LoadNext));
    }

    #[test]
    fn test_reset() {
        let mut bridge = SignalBridge::new();
        bridge.observe(AT_END, false);
        bridge.reset();
        assert_eq!(bridge.observe(AT_END, false), Some(Trigger::LoadNext));
    }
}
