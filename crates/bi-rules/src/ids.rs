//! Rule id allocation.
//!
//! Each site prefers the slot `offset + (site_id % range)`. Sites are fed in
//! ascending id order and a taken slot is resolved by probing forward
//! (wrapping) inside `[offset, offset + range)`, so the mapping is injective
//! and depends only on the site list.

use std::collections::HashSet;

use bi_core::SiteId;
use log::warn;

use crate::rule::RuleId;

pub const DEFAULT_RULE_ID_OFFSET: RuleId = 1000;
pub const DEFAULT_RULE_ID_RANGE: RuleId = 900_000;

#[derive(Debug, Clone)]
pub struct RuleIdAllocator {
    offset: RuleId,
    range: RuleId,
    taken: HashSet<RuleId>,
}

impl RuleIdAllocator {
    pub fn new(offset: RuleId, range: RuleId) -> Self {
        Self {
            offset,
            range: range.max(1),
            taken: HashSet::new(),
        }
    }

    /// Slot a site would get with no competition.
    pub fn preferred(&self, site: SiteId) -> RuleId {
        self.offset.saturating_add((site.0 % u64::from(self.range)) as RuleId)
    }

    /// Whether `id` belongs to the range this allocator manages.
    pub fn is_managed(&self, id: RuleId) -> bool {
        id >= self.offset && u64::from(id) < u64::from(self.offset) + u64::from(self.range)
    }

    /// Claim a rule id for `site`, or `None` once the range is exhausted.
    pub fn allocate(&mut self, site: SiteId) -> Option<RuleId> {
        let start = site.0 % u64::from(self.range);
        for step in 0..u64::from(self.range) {
            let slot = (start + step) % u64::from(self.range);
            let Ok(id) = RuleId::try_from(u64::from(self.offset) + slot) else {
                continue;
            };
            if self.taken.insert(id) {
                if step > 0 {
                    warn!("rule id {} taken, site {} probed to {}", self.preferred(site), site, id);
                }
                return Some(id);
            }
        }
        None
    }
}

impl Default for RuleIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_ID_OFFSET, DEFAULT_RULE_ID_RANGE)
    }
}
