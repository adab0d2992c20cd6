//! Priority scheduler - orders managed resources for initialization and
//! reporting.
//!
//! The order is a stable descending sort by priority. Resource counts are
//! small, so a bubble sort with a strict greater-than swap is used: equal
//! priorities never swap and keep their input order.

use crate::registry::Discovered;
use crate::resource::ManagedResource;

/// Anything with a scheduling priority.
pub trait Prioritized {
    fn priority(&self) -> i32;
}

impl Prioritized for ManagedResource {
    fn priority(&self) -> i32 {
        ManagedResource::priority(self)
    }
}

impl Prioritized for Discovered {
    fn priority(&self) -> i32 {
        self.resource.priority()
    }
}

/// Scheduler for initialization and report order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scheduler;

impl Scheduler {
    /// Create a new scheduler.
    pub fn new() -> Self {
        Self
    }

    /// Order items by non-increasing priority, preserving ties.
    pub fn order<T: Prioritized>(&self, mut items: Vec<T>) -> Vec<T> {
        loop {
            let mut swapped = false;
            for i in 1..items.len() {
                if items[i].priority() > items[i - 1].priority() {
                    items.swap(i - 1, i);
                    swapped = true;
                }
            }
            if !swapped {
                return items;
            }
        }
    }
}
