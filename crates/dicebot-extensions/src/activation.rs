//! Per-conversation activation state.
//!
//! The active list is ordered by priority: the front entry is consulted first
//! during command resolution, so the most recently activated capability wins
//! a command-name clash. Names the conversation switched off by hand are kept
//! in the inactivated set so later syncs and reloads do not switch them back
//! on.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::Capability;
use crate::registry::CapabilityRegistry;

/// Why a capability is being activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateReason {
    /// A user asked for it.
    Manual,
    /// Auto-activation on a conversation's first look at the capability.
    FirstMessage,
    /// Restoring state after a reload.
    Reload,
}

/// Why a capability is being deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivateReason {
    /// A user asked for it. Always recorded as inactivated.
    Manual,
    /// Internal housekeeping.
    System,
}

/// Persisted form of a conversation's activation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationSnapshot {
    /// Active capability names, highest priority first.
    pub active: Vec<String>,
    /// Names switched off by hand.
    pub inactivated: BTreeSet<String>,
    /// Registry version last applied.
    pub applied_version: u64,
}

/// Outcome of activating a user-supplied list of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Canonical names the user asked for that resolved.
    pub activated: Vec<String>,
    /// Capabilities switched on as companions, not requested directly.
    pub companions: Vec<String>,
    /// Already-active capabilities declared as conflicting with a requested one.
    pub conflicts: Vec<String>,
    /// Requested names that matched nothing.
    pub unknown: Vec<String>,
}

/// Activation state of one conversation.
#[derive(Clone, Default)]
pub struct ActivationState {
    active: Vec<Arc<Capability>>,
    inactivated: BTreeSet<String>,
    snapshot: Vec<String>,
    applied_version: u64,
}

impl ActivationState {
    /// Empty state that has not seen any registry version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State awaiting [`activate_batch_by_snapshot_order`](Self::activate_batch_by_snapshot_order).
    ///
    /// The active list starts empty; the snapshot order and the inactivated
    /// set are carried over.
    #[must_use]
    pub fn from_snapshot(snapshot: ActivationSnapshot) -> Self {
        Self {
            active: Vec::new(),
            inactivated: snapshot.inactivated,
            snapshot: snapshot.active,
            applied_version: snapshot.applied_version,
        }
    }

    /// Current state in persisted form.
    #[must_use]
    pub fn snapshot(&self) -> ActivationSnapshot {
        ActivationSnapshot {
            active: self.active_names(),
            inactivated: self.inactivated.clone(),
            applied_version: self.applied_version,
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Active capabilities, highest priority first.
    #[must_use]
    pub fn active(&self) -> &[Arc<Capability>] {
        &self.active
    }

    /// Active capability names, highest priority first.
    #[must_use]
    pub fn active_names(&self) -> Vec<String> {
        self.active.iter().map(|c| c.name().to_string()).collect()
    }

    /// Names switched off by hand.
    #[must_use]
    pub fn inactivated_names(&self) -> &BTreeSet<String> {
        &self.inactivated
    }

    /// Whether `name` is in the active list.
    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether `name` was switched off by hand.
    #[must_use]
    pub fn is_inactivated(&self, name: &str) -> bool {
        self.inactivated.contains(name)
    }

    /// Active capability called `name`.
    #[must_use]
    pub fn get_active(&self, name: &str) -> Option<&Arc<Capability>> {
        self.active.iter().find(|c| c.name() == name)
    }

    /// Registry version last applied.
    #[must_use]
    pub fn applied_version(&self) -> u64 {
        self.applied_version
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.active.iter().position(|c| c.name() == name)
    }

    // -----------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------

    /// Move `capability` to the front, clearing any inactivated mark.
    fn promote(&mut self, capability: &Arc<Capability>) {
        self.inactivated.remove(capability.name());
        if let Some(pos) = self.position(capability.name()) {
            self.active.remove(pos);
        }
        self.active.insert(0, Arc::clone(capability));
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = self.active_names();
    }

    /// Activate `capability` and everything chained to it.
    ///
    /// The capability goes to the front first, then each companion in
    /// discovery order, so the last companion discovered ends up with the
    /// highest priority.
    pub fn activate(
        &mut self,
        registry: &CapabilityRegistry,
        capability: &Arc<Capability>,
        reason: ActivateReason,
    ) {
        self.promote(capability);
        let chained = registry.chained(capability.name());
        for companion in &chained {
            self.promote(companion);
        }
        self.refresh_snapshot();
        debug!(
            capability = %capability.name(),
            ?reason,
            companions = chained.len(),
            "Activated capability"
        );
    }

    /// Deactivate `capability` and everything chained to it.
    ///
    /// Every affected name is recorded as inactivated when `mark_inactivated`
    /// is set or the reason is [`DeactivateReason::Manual`]. Open storage
    /// handles of affected capabilities are closed. Returns the first
    /// capability actually removed from the active list.
    pub fn deactivate(
        &mut self,
        registry: &CapabilityRegistry,
        capability: &Arc<Capability>,
        reason: DeactivateReason,
        mark_inactivated: bool,
    ) -> Option<Arc<Capability>> {
        let mark = mark_inactivated || reason == DeactivateReason::Manual;
        let mut names = vec![capability.name().to_string()];
        names.extend(registry.chained_names(capability.name()));

        let mut removed = None;
        for name in &names {
            if mark {
                self.inactivated.insert(name.clone());
            }
            if let Some(found) = registry.find(name) {
                found.close_storage();
            }
            if let Some(pos) = self.position(name) {
                let gone = self.active.remove(pos);
                if removed.is_none() {
                    removed = Some(gone);
                }
            }
        }
        self.refresh_snapshot();
        debug!(
            capability = %capability.name(),
            ?reason,
            marked = mark,
            affected = names.len(),
            "Deactivated capability"
        );
        removed
    }

    /// Manually deactivate an active capability by name or alias.
    ///
    /// Returns `None` when nothing by that name is active.
    pub fn deactivate_by_name(
        &mut self,
        registry: &CapabilityRegistry,
        name: &str,
    ) -> Option<Arc<Capability>> {
        let canonical = registry.canonical_name(name).unwrap_or(name);
        let capability = Arc::clone(self.get_active(canonical)?);
        self.deactivate(registry, &capability, DeactivateReason::Manual, true)
    }

    /// Activate a user-supplied list of names or aliases.
    pub fn activate_requested(
        &mut self,
        registry: &CapabilityRegistry,
        names: &[&str],
    ) -> ActivationReport {
        let before: HashSet<String> = self.active_names().into_iter().collect();
        let mut report = ActivationReport::default();
        let mut requested: Vec<Arc<Capability>> = Vec::new();

        for name in names {
            let Some(capability) = registry.find(name) else {
                report.unknown.push((*name).to_string());
                continue;
            };
            if report.activated.iter().any(|n| n == capability.name()) {
                continue;
            }
            for conflict in capability.conflicts() {
                if self.is_active(conflict) && !report.conflicts.contains(conflict) {
                    report.conflicts.push(conflict.clone());
                }
            }
            self.activate(registry, capability, ActivateReason::Manual);
            report.activated.push(capability.name().to_string());
            requested.push(Arc::clone(capability));
        }

        for capability in &requested {
            for companion in registry.chained_names(capability.name()) {
                if self.is_active(&companion)
                    && !before.contains(&companion)
                    && !report.activated.contains(&companion)
                    && !report.companions.contains(&companion)
                {
                    report.companions.push(companion);
                }
            }
        }
        report
    }

    /// Restore priority order from the stored snapshot.
    ///
    /// The snapshot is replayed back to front (each activation inserts at the
    /// front) skipping inactivated names; capabilities not in the snapshot
    /// are then activated when they are in `first_load` or auto-activating.
    pub fn activate_batch_by_snapshot_order(
        &mut self,
        registry: &CapabilityRegistry,
        capabilities: &[Arc<Capability>],
        first_load: &HashSet<String>,
    ) {
        if capabilities.is_empty() {
            return;
        }
        let snapshot = self.snapshot.clone();
        let in_snapshot: HashSet<&str> = snapshot.iter().map(String::as_str).collect();

        for name in snapshot.iter().rev() {
            if self.is_inactivated(name) {
                continue;
            }
            if let Some(capability) = capabilities.iter().find(|c| c.name() == name) {
                self.activate(registry, capability, ActivateReason::Reload);
            }
        }

        for capability in capabilities {
            if in_snapshot.contains(capability.name()) || self.is_inactivated(capability.name()) {
                continue;
            }
            if first_load.contains(capability.name()) || capability.auto_activate() {
                self.activate(registry, capability, ActivateReason::Reload);
            }
        }
        self.refresh_snapshot();
    }

    /// Attach newly loaded capabilities that have no snapshot entry.
    ///
    /// Known names (active or inactivated) are left alone. First-load or
    /// auto-activating capabilities are switched on; the rest are recorded
    /// as inactivated.
    pub fn activate_batch(
        &mut self,
        registry: &CapabilityRegistry,
        capabilities: &[Arc<Capability>],
        first_load: &HashSet<String>,
    ) {
        for capability in capabilities {
            let name = capability.name();
            if self.is_active(name) || self.is_inactivated(name) {
                continue;
            }
            if first_load.contains(name) || capability.auto_activate() {
                self.activate(registry, capability, ActivateReason::FirstMessage);
            } else {
                self.inactivated.insert(name.to_string());
            }
        }
    }

    /// Catch up with capabilities registered since the last applied version.
    ///
    /// Returns `true` if a sync pass ran.
    pub fn sync_on_message(&mut self, registry: &CapabilityRegistry) -> bool {
        let live = registry.version();
        if self.applied_version == live {
            return false;
        }
        let mut auto = 0usize;
        for capability in registry.list() {
            let name = capability.name();
            if self.is_active(name) || self.is_inactivated(name) {
                continue;
            }
            if capability.auto_activate() {
                self.activate(registry, capability, ActivateReason::FirstMessage);
                auto = auto.saturating_add(1);
            } else {
                self.inactivated.insert(name.to_string());
            }
        }
        debug!(
            from = self.applied_version,
            to = live,
            auto_activated = auto,
            "Synced capabilities"
        );
        self.applied_version = live;
        true
    }
}

impl fmt::Debug for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationState")
            .field("active", &self.active_names())
            .field("inactivated", &self.inactivated)
            .field("applied_version", &self.applied_version)
            .finish_non_exhaustive()
    }
}
