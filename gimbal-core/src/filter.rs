//! Data-governance extension point.
//!
//! If a filter is configured, the orchestrator invokes it as a pure
//! post-processing step on result items before they leave the engine. The
//! engine makes no assumption about its internals — masking, row filtering,
//! and audit side-channels all live behind this one contract.

use crate::result::ResultItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Caller identity attached to a search for governance decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Principal issuing the search.
    pub principal: String,
    /// Roles granted to the principal.
    pub roles: BTreeSet<String>,
}

impl SecurityContext {
    /// Context for a named principal with no roles.
    pub fn for_principal(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Grant one role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Whether the principal holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Pure post-processing filter over result items.
///
/// Implementations must be `Send + Sync` and must not perform I/O on the
/// search hot path.
pub trait GovernanceFilter: Send + Sync {
    /// Filter or transform items for the given caller.
    fn filter(&self, items: Vec<ResultItem>, context: &SecurityContext) -> Vec<ResultItem>;
}

/// The no-op filter: every item passes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl GovernanceFilter for AllowAll {
    fn filter(&self, items: Vec<ResultItem>, _context: &SecurityContext) -> Vec<ResultItem> {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BackendKind;

    #[test]
    fn test_security_context_roles() {
        let context = SecurityContext::for_principal("svc-search")
            .with_role("reader")
            .with_role("auditor");
        assert_eq!(context.principal, "svc-search");
        assert!(context.has_role("reader"));
        assert!(!context.has_role("admin"));
    }

    #[test]
    fn test_allow_all_passes_items_through() {
        let items = vec![
            ResultItem::new("a", 1.0, BackendKind::Store),
            ResultItem::new("b", 0.5, BackendKind::Store),
        ];
        let filtered = AllowAll.filter(items.clone(), &SecurityContext::default());
        assert_eq!(filtered, items);
    }

    #[test]
    fn test_custom_filter_can_drop_rows() {
        struct DropLowScores;
        impl GovernanceFilter for DropLowScores {
            fn filter(
                &self,
                items: Vec<ResultItem>,
                _context: &SecurityContext,
            ) -> Vec<ResultItem> {
                items.into_iter().filter(|i| i.score >= 0.5).collect()
            }
        }

        let items = vec![
            ResultItem::new("keep", 0.9, BackendKind::Store),
            ResultItem::new("drop", 0.1, BackendKind::Store),
        ];
        let filtered = DropLowScores.filter(items, &SecurityContext::default());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "keep");
    }
}
