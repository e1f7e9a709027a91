use std::collections::HashMap;

/// Result of a CHECK. Informational only; the count is never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Available(u32),
    Unavailable,
}

/// Result of a BORROW attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowOutcome {
    Borrowed { remaining: u32 },
    Unavailable,
}

/// Result of a RETURN attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    Returned { available: u32 },
    UnknownItem,
}

/// Item availability for one replica. Counts never go negative; a failed
/// attempt leaves the map untouched. Mutated only inside the replica state's
/// exclusion section.
#[derive(Debug, Default)]
pub struct Inventory {
    items: HashMap<String, u32>,
}

impl Inventory {
    pub fn from_catalog(catalog: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            items: catalog.into_iter().collect(),
        }
    }

    pub fn count(&self, item: &str) -> Option<u32> {
        self.items.get(item).copied()
    }

    pub fn check(&self, item: &str) -> CheckOutcome {
        match self.items.get(item) {
            Some(&count) if count > 0 => CheckOutcome::Available(count),
            _ => CheckOutcome::Unavailable,
        }
    }

    /// Decrements the count on success; an unknown or exhausted item fails
    /// without mutation.
    pub fn borrow_item(&mut self, item: &str) -> BorrowOutcome {
        match self.items.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                BorrowOutcome::Borrowed { remaining: *count }
            }
            _ => BorrowOutcome::Unavailable,
        }
    }

    /// Increments a known item's count; unknown identifiers are rejected,
    /// never created.
    pub fn return_item(&mut self, item: &str) -> ReturnOutcome {
        match self.items.get_mut(item) {
            Some(count) => {
                *count += 1;
                ReturnOutcome::Returned { available: *count }
            }
            None => ReturnOutcome::UnknownItem,
        }
    }
}
