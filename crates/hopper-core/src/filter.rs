//! The four-state filter policy applied before any transfer primitive runs.
//!
//! A filter is evaluated per source slot. `Destroy` is special: listed types
//! are annihilated at the source, up to the remaining budget, and whatever
//! budget is left proceeds under `None` semantics. The same rule applies to
//! suction, link transfers, and deferred transfers.

use crate::id::ItemTypeId;
use crate::item::ItemStack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// FilterType
// ---------------------------------------------------------------------------

/// Filter policy. Transitions only follow the cycle
/// `None -> Whitelist -> Blacklist -> Destroy -> None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    None,
    Whitelist,
    Blacklist,
    Destroy,
}

impl FilterType {
    /// The next state in the cycle.
    pub fn next(self) -> Self {
        match self {
            FilterType::None => FilterType::Whitelist,
            FilterType::Whitelist => FilterType::Blacklist,
            FilterType::Blacklist => FilterType::Destroy,
            FilterType::Destroy => FilterType::None,
        }
    }

    /// Persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::None => "NONE",
            FilterType::Whitelist => "WHITELIST",
            FilterType::Blacklist => "BLACKLIST",
            FilterType::Destroy => "DESTROY",
        }
    }

    /// Parse a persisted name. Unknown names fall back to `None`.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "WHITELIST" => FilterType::Whitelist,
            "BLACKLIST" => FilterType::Blacklist,
            "DESTROY" => FilterType::Destroy,
            _ => FilterType::None,
        }
    }
}

/// What a filter says about one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Pass,
    Reject,
    Destroy,
}

/// Evaluate the policy for one item type.
pub fn evaluate(
    filter_type: FilterType,
    filter_set: &BTreeSet<ItemTypeId>,
    item_type: ItemTypeId,
) -> FilterDecision {
    match filter_type {
        FilterType::None => FilterDecision::Pass,
        FilterType::Whitelist if filter_set.contains(&item_type) => FilterDecision::Pass,
        FilterType::Whitelist => FilterDecision::Reject,
        FilterType::Blacklist if filter_set.contains(&item_type) => FilterDecision::Reject,
        FilterType::Blacklist => FilterDecision::Pass,
        FilterType::Destroy if filter_set.contains(&item_type) => FilterDecision::Destroy,
        FilterType::Destroy => FilterDecision::Pass,
    }
}

/// Whether `item_type` may be placed in a destination under this policy.
/// Destroyed types are never placed, so they are not allowed.
pub fn is_allowed(
    filter_type: FilterType,
    filter_set: &BTreeSet<ItemTypeId>,
    item_type: ItemTypeId,
) -> bool {
    evaluate(filter_type, filter_set, item_type) == FilterDecision::Pass
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A policy plus its item-type set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub filter_type: FilterType,
    pub items: BTreeSet<ItemTypeId>,
}

impl Filter {
    pub fn new(filter_type: FilterType, items: impl IntoIterator<Item = ItemTypeId>) -> Self {
        Self {
            filter_type,
            items: items.into_iter().collect(),
        }
    }

    pub fn decide(&self, item_type: ItemTypeId) -> FilterDecision {
        evaluate(self.filter_type, &self.items, item_type)
    }

    pub fn allows(&self, item_type: ItemTypeId) -> bool {
        is_allowed(self.filter_type, &self.items, item_type)
    }

    /// Advance to the next policy in the cycle. The item set is kept.
    pub fn cycle(&mut self) -> FilterType {
        self.filter_type = self.filter_type.next();
        self.filter_type
    }

    /// Returns false if the type was already listed.
    pub fn add_item(&mut self, item_type: ItemTypeId) -> bool {
        self.items.insert(item_type)
    }

    /// Returns false if the type was not listed.
    pub fn remove_item(&mut self, item_type: ItemTypeId) -> bool {
        self.items.remove(&item_type)
    }

    /// Apply this filter to one source slot with a budget of `amount` units.
    ///
    /// `route` places units from the slot into a destination and returns how
    /// many it moved. It is only called for passing items, and for the
    /// leftover budget after a destroy.
    pub fn apply_to_slot<F>(
        &self,
        slot: &mut Option<ItemStack>,
        amount: u32,
        route: F,
    ) -> TransferTally
    where
        F: FnOnce(&mut Option<ItemStack>, u32) -> u32,
    {
        let mut tally = TransferTally::default();
        let Some(stack) = slot.as_mut() else {
            return tally;
        };
        if amount == 0 {
            return tally;
        }

        let mut budget = amount;
        match self.decide(stack.item_type) {
            FilterDecision::Reject => {
                tally.rejected = true;
                return tally;
            }
            FilterDecision::Destroy => {
                let destroyed = budget.min(stack.count);
                stack.count -= destroyed;
                tally.destroyed = destroyed;
                tally.destroyed_type = Some(stack.item_type);
                budget -= destroyed;
                if stack.count == 0 {
                    *slot = None;
                }
            }
            FilterDecision::Pass => {}
        }

        if budget > 0 && slot.is_some() {
            tally.moved = route(slot, budget);
        }
        tally
    }
}

// ---------------------------------------------------------------------------
// TransferTally
// ---------------------------------------------------------------------------

/// Result of running a filtered transfer step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferTally {
    /// Units placed in a destination.
    pub moved: u32,
    /// Units annihilated by a `Destroy` filter.
    pub destroyed: u32,
    /// Type of the destroyed units, when any were destroyed.
    pub destroyed_type: Option<ItemTypeId>,
    /// Set when the filter rejected the slot outright.
    pub rejected: bool,
}

impl TransferTally {
    /// Budget consumed by this step.
    pub fn consumed(&self) -> u32 {
        self.moved + self.destroyed
    }

    /// Whether anything happened (the action "fired").
    pub fn fired(&self) -> bool {
        self.consumed() > 0
    }

    pub fn absorb(&mut self, other: TransferTally) {
        self.moved += other.moved;
        self.destroyed += other.destroyed;
        if other.destroyed_type.is_some() {
            self.destroyed_type = other.destroyed_type;
        }
        self.rejected |= other.rejected;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
