//! Subscription Reconciliation
//!
//! Domain types for converging the live (server-side) subscription toward
//! what the user asked for.
//!
//! # Design
//!
//! Two sets are tracked per session:
//! - the **desired** set, owned by the user and surviving reconnects
//! - the **subscribed** set, what the server has been told so far; it is
//!   optimistic (no server ack is modeled) and cleared on every reconnect
//!
//! [`reconcile`] is a pure diff of the two. [`SubscriptionState`] wraps both
//! sets so the session can run the diff and record the result in one step.

use crate::domain::symbol::SymbolSet;

// =============================================================================
// Subscription Changes
// =============================================================================

/// Changes to apply upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Symbols to subscribe to.
    pub subscribe: SymbolSet,
    /// Symbols to unsubscribe from.
    pub unsubscribe: SymbolSet,
}

impl SubscriptionChanges {
    /// Check if there are any changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

/// Diff `desired` against `subscribed`.
///
/// `subscribe = desired − subscribed`, `unsubscribe = subscribed − desired`.
#[must_use]
pub fn reconcile(desired: &SymbolSet, subscribed: &SymbolSet) -> SubscriptionChanges {
    SubscriptionChanges {
        subscribe: desired.difference(subscribed).cloned().collect(),
        unsubscribe: subscribed.difference(desired).cloned().collect(),
    }
}

// =============================================================================
// Subscription State
// =============================================================================

/// Desired and subscribed symbol sets for one client.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionState {
    desired: SymbolSet,
    subscribed: SymbolSet,
}

impl SubscriptionState {
    /// Create state with an initial desired set and nothing subscribed.
    #[must_use]
    pub const fn new(desired: SymbolSet) -> Self {
        Self {
            desired,
            subscribed: SymbolSet::new(),
        }
    }

    /// Symbols the user wants streamed.
    #[must_use]
    pub const fn desired(&self) -> &SymbolSet {
        &self.desired
    }

    /// Symbols the server has been told about.
    #[must_use]
    pub const fn subscribed(&self) -> &SymbolSet {
        &self.subscribed
    }

    /// Add symbols to the desired set.
    pub fn add_desired(&mut self, symbols: SymbolSet) {
        self.desired.extend(symbols);
    }

    /// Remove symbols from the desired set.
    pub fn remove_desired(&mut self, symbols: &SymbolSet) {
        self.desired.retain(|s| !symbols.contains(s));
    }

    /// Changes needed to bring the subscribed set in line with the desired set.
    #[must_use]
    pub fn pending(&self) -> SubscriptionChanges {
        reconcile(&self.desired, &self.subscribed)
    }

    /// Record changes as sent.
    pub fn apply(&mut self, changes: &SubscriptionChanges) {
        self.subscribed.extend(changes.subscribe.iter().cloned());
        self.subscribed.retain(|s| !changes.unsubscribe.contains(s));
    }

    /// Compute pending changes and record them as sent.
    pub fn reconcile(&mut self) -> SubscriptionChanges {
        let changes = self.pending();
        self.apply(&changes);
        changes
    }

    /// Forget the server-side subscription (transport went away).
    pub fn clear_subscribed(&mut self) {
        self.subscribed.clear();
    }

    /// Forget everything, desired included.
    pub fn clear_all(&mut self) {
        self.desired.clear();
        self.subscribed.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbol::normalize_symbols;
    use proptest::prelude::*;

    fn set(symbols: &[&str]) -> SymbolSet {
        normalize_symbols(symbols)
    }

    #[test]
    fn reconcile_computes_both_directions() {
        let changes = reconcile(&set(&["AAPL", "MSFT"]), &set(&["MSFT", "TSLA"]));
        assert_eq!(changes.subscribe, set(&["AAPL"]));
        assert_eq!(changes.unsubscribe, set(&["TSLA"]));
        assert!(!changes.is_empty());
    }

    #[test]
    fn reconcile_equal_sets_is_empty() {
        let desired = set(&["AAPL", "MSFT"]);
        assert!(reconcile(&desired, &desired).is_empty());
        assert!(reconcile(&SymbolSet::new(), &SymbolSet::new()).is_empty());
    }

    #[test]
    fn state_reconcile_converges() {
        let mut state = SubscriptionState::new(set(&["AAPL", "MSFT"]));

        let changes = state.reconcile();
        assert_eq!(changes.subscribe, set(&["AAPL", "MSFT"]));
        assert_eq!(state.subscribed(), state.desired());

        // Second pass has nothing to do
        assert!(state.reconcile().is_empty());
    }

    #[test]
    fn state_tracks_runtime_mutations() {
        let mut state = SubscriptionState::new(set(&["AAPL"]));
        let _ = state.reconcile();

        state.add_desired(set(&["TSLA"]));
        state.remove_desired(&set(&["AAPL"]));

        let changes = state.reconcile();
        assert_eq!(changes.subscribe, set(&["TSLA"]));
        assert_eq!(changes.unsubscribe, set(&["AAPL"]));
        assert_eq!(state.subscribed(), &set(&["TSLA"]));
    }

    #[test]
    fn clear_subscribed_keeps_desired() {
        let mut state = SubscriptionState::new(set(&["AAPL"]));
        let _ = state.reconcile();

        state.clear_subscribed();

        assert!(state.subscribed().is_empty());
        assert_eq!(state.desired(), &set(&["AAPL"]));
        // Same symbols get resubscribed rather than assumed active
        assert_eq!(state.pending().subscribe, set(&["AAPL"]));
    }

    #[test]
    fn clear_all_empties_both_sets() {
        let mut state = SubscriptionState::new(set(&["AAPL"]));
        let _ = state.reconcile();

        state.clear_all();

        assert!(state.desired().is_empty());
        assert!(state.subscribed().is_empty());
        assert!(state.pending().is_empty());
    }

    fn arb_set() -> impl Strategy<Value = SymbolSet> {
        proptest::collection::vec("[A-E]{1,2}", 0..12).prop_map(|raw| normalize_symbols(&raw))
    }

    proptest! {
        #[test]
        fn reconcile_matches_set_difference(desired in arb_set(), subscribed in arb_set()) {
            let changes = reconcile(&desired, &subscribed);
            let expected_add: SymbolSet = desired.difference(&subscribed).cloned().collect();
            let expected_remove: SymbolSet = subscribed.difference(&desired).cloned().collect();
            prop_assert_eq!(changes.subscribe, expected_add);
            prop_assert_eq!(changes.unsubscribe, expected_remove);
        }

        #[test]
        fn reconcile_is_idempotent_on_equal_sets(desired in arb_set()) {
            prop_assert!(reconcile(&desired, &desired).is_empty());
        }

        #[test]
        fn applying_changes_converges(desired in arb_set(), subscribed in arb_set()) {
            let mut state = SubscriptionState::new(desired.clone());
            state.apply(&SubscriptionChanges { subscribe: subscribed, unsubscribe: SymbolSet::new() });
            let _ = state.reconcile();
            prop_assert_eq!(state.subscribed(), &desired);
        }
    }
}
