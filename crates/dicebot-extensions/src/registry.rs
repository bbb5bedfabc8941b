//! Capability registry and the ActiveWith companion graph.
//!
//! The registry owns every known [`Capability`] in registration order and
//! answers case-insensitive lookups by name or alias. Each successful
//! registration bumps the registry version, which conversations compare
//! against to decide whether they need to look at new capabilities.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dicebot_config::{Config, ExtensionSection};
use tracing::{info, warn};

use crate::capability::Capability;
use crate::error::{ExtensionError, ExtensionResult};

/// Default bound on companion chain expansion.
pub const DEFAULT_CHAIN_DEPTH: usize = 10;

// ---------------------------------------------------------------------------
// ActiveWith graph
// ---------------------------------------------------------------------------

/// Companion target name to follower names.
///
/// A capability that lists `X` as a companion target appears under `X`, so
/// activating `X` pulls it in.
#[derive(Debug, Clone, Default)]
pub struct ActiveWithGraph {
    edges: HashMap<String, Vec<String>>,
}

impl ActiveWithGraph {
    /// Build the graph from a set of capabilities, keying edges by the
    /// companion targets exactly as declared.
    pub fn build<'a>(capabilities: impl IntoIterator<Item = &'a Capability>) -> Self {
        Self::build_with(capabilities, |_| None)
    }

    /// Build the graph, mapping each declared target through `resolve`.
    ///
    /// `resolve` turns a name or alias into the canonical capability name;
    /// targets it does not know are kept as declared.
    pub fn build_with<'a>(
        capabilities: impl IntoIterator<Item = &'a Capability>,
        resolve: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for capability in capabilities {
            for target in capability.companions() {
                let key = resolve(target).unwrap_or_else(|| target.clone());
                edges.entry(key).or_default().push(capability.name().to_string());
            }
        }
        Self { edges }
    }

    /// Followers of `name`, in registration order.
    #[must_use]
    pub fn followers(&self, name: &str) -> &[String] {
        self.edges.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether no capability declares a companion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Collect every capability transitively pulled in by `base`.
///
/// Depth-first with in-progress and completed marks. A cycle is logged and
/// the offending edge skipped; a branch deeper than `depth_limit` is logged
/// and cut. The result is in post-order and never contains `base`.
#[must_use]
pub fn collect_chained(graph: &ActiveWithGraph, base: &str, depth_limit: usize) -> Vec<String> {
    struct Walk<'g> {
        graph: &'g ActiveWithGraph,
        base: &'g str,
        limit: usize,
        visiting: HashSet<&'g str>,
        visited: HashSet<&'g str>,
        order: Vec<String>,
    }

    impl<'g> Walk<'g> {
        fn visit(&mut self, name: &'g str, depth: usize) {
            if depth > self.limit {
                warn!(capability = %name, limit = self.limit, "Companion chain too deep, not expanding further");
                return;
            }
            if self.visiting.contains(name) {
                warn!(capability = %name, "Companion cycle detected, skipping");
                return;
            }
            if self.visited.contains(name) {
                return;
            }
            self.visiting.insert(name);
            for follower in self.graph.followers(name) {
                self.visit(follower, depth.saturating_add(1));
            }
            self.visiting.remove(name);
            self.visited.insert(name);
            if name != self.base {
                self.order.push(name.to_string());
            }
        }
    }

    let mut walk = Walk {
        graph,
        base,
        limit: depth_limit,
        visiting: HashSet::new(),
        visited: HashSet::new(),
        order: Vec::new(),
    };
    walk.visit(base, 0);
    walk.order
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry of all known capabilities.
#[derive(Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<Capability>>,
    /// Lowercased name or alias to position in `capabilities`.
    index: HashMap<String, usize>,
    version: u64,
    chain_depth: usize,
    /// Operator overrides keyed by lowercased capability name.
    overrides: HashMap<String, ExtensionSection>,
    graph: OnceLock<ActiveWithGraph>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
            index: HashMap::new(),
            version: 0,
            chain_depth: DEFAULT_CHAIN_DEPTH,
            overrides: HashMap::new(),
            graph: OnceLock::new(),
        }
    }

    /// Create a registry using the chain depth and `[extensions.*]`
    /// overrides from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new().with_chain_depth(config.activation.max_chain_depth);
        for (name, section) in &config.extensions {
            registry.overrides.insert(name.to_lowercase(), section.clone());
        }
        registry
    }

    /// Set the companion chain depth limit.
    #[must_use]
    pub fn with_chain_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    /// Register a capability.
    ///
    /// Operator overrides for its name are applied before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::NameCollision`] if the name or any alias is
    /// already taken (case-insensitively), including by the capability itself.
    pub fn register(&mut self, mut capability: Capability) -> ExtensionResult<Arc<Capability>> {
        let mut keys: Vec<String> = Vec::with_capacity(capability.aliases().len().saturating_add(1));
        for key in std::iter::once(capability.name()).chain(capability.aliases().iter().map(String::as_str)) {
            let key = key.to_lowercase();
            if let Some(&pos) = self.index.get(&key) {
                let existing = self
                    .capabilities
                    .get(pos)
                    .map_or_else(String::new, |c| c.name().to_string());
                return Err(ExtensionError::NameCollision { name: key, existing });
            }
            if keys.contains(&key) {
                return Err(ExtensionError::NameCollision {
                    name: key,
                    existing: capability.name().to_string(),
                });
            }
            keys.push(key);
        }

        if let Some(section) = self.overrides.get(&capability.name().to_lowercase()) {
            capability.apply_override(section);
        }

        let pos = self.capabilities.len();
        for key in keys {
            self.index.insert(key, pos);
        }
        let capability = Arc::new(capability);
        self.capabilities.push(Arc::clone(&capability));
        self.version = self.version.saturating_add(1);
        self.graph.take();

        info!(
            capability = %capability.name(),
            version = self.version,
            commands = capability.command_names().count(),
            "Registered capability"
        );
        Ok(capability)
    }

    /// Look up a capability by name or alias (case-insensitive).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<Capability>> {
        self.index
            .get(&name.to_lowercase())
            .and_then(|&pos| self.capabilities.get(pos))
    }

    /// Resolve an alias to the canonical name.
    #[must_use]
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.find(name).map(|c| c.name())
    }

    /// All capabilities in registration order.
    #[must_use]
    pub fn list(&self) -> &[Arc<Capability>] {
        &self.capabilities
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Registry version, bumped on every registration.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Companion chain depth limit.
    #[must_use]
    pub fn chain_depth(&self) -> usize {
        self.chain_depth
    }

    /// The companion graph, built on first use after a registration.
    pub fn graph(&self) -> &ActiveWithGraph {
        self.graph.get_or_init(|| {
            ActiveWithGraph::build_with(self.capabilities.iter().map(AsRef::as_ref), |target| {
                self.canonical_name(target).map(str::to_string)
            })
        })
    }

    /// Capabilities transitively pulled in by `base`, resolved against the
    /// registry. Names with no registered capability are dropped.
    #[must_use]
    pub fn chained(&self, base: &str) -> Vec<Arc<Capability>> {
        self.chained_names(base)
            .iter()
            .filter_map(|name| self.find(name).cloned())
            .collect()
    }

    /// Names transitively pulled in by `base`.
    #[must_use]
    pub fn chained_names(&self, base: &str) -> Vec<String> {
        let base = self.canonical_name(base).unwrap_or(base);
        collect_chained(self.graph(), base, self.chain_depth)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field(
                "capabilities",
                &self.capabilities.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("version", &self.version)
            .field("chain_depth", &self.chain_depth)
            .finish_non_exhaustive()
    }
}
