//! The macro call-site dependency graph: one node per discovered call
//! site, edges for "argument references the result of", and a
//! topological ordering that drives the execution phase.
//!
//! Unlike a release-publish graph sorted with Kahn's algorithm, cycle
//! detection here has to hand back an *ordered* path through the cycle —
//! a cyclic fixture's error message names every site in the cycle in
//! dependency order. Kahn's algorithm only tells you that some node never
//! reached indegree zero, not which ones formed the ring — so this graph
//! walks a DFS with three-color marks instead.

use std::collections::{BTreeMap, BTreeSet};

use pod_types::SiteKey;
use swc_ecma_ast::{CallExpr, Expr};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// One discovered macro call site.
#[derive(Debug, Clone)]
pub struct MacroSite {
    pub key: SiteKey,
    pub file: String,
    pub binding: String,
    pub call: CallExpr,
    pub dependencies: BTreeSet<SiteKey>,
    pub computed: bool,
    pub result: Option<Expr>,
}

impl MacroSite {
    fn new(key: SiteKey, file: String, binding: String, call: CallExpr) -> Self {
        Self {
            key,
            file,
            binding,
            call,
            dependencies: BTreeSet::new(),
            computed: false,
            result: None,
        }
    }
}

/// The dependency graph over one project's macro call sites, spanning
/// every file discovered during the expander's Phase 1 walk.
#[derive(Debug, Default)]
pub struct Graph {
    sites: BTreeMap<SiteKey, MacroSite>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call site. Idempotent: re-adding the same key leaves
    /// the existing node (and any dependencies already recorded against
    /// it) untouched, since discovery can revisit a binding while probing
    /// a dependency's own arguments.
    pub fn add_site(&mut self, key: SiteKey, file: String, binding: String, call: CallExpr) {
        self.sites
            .entry(key.clone())
            .or_insert_with(|| MacroSite::new(key, file, binding, call));
    }

    pub fn contains(&self, key: &SiteKey) -> bool {
        self.sites.contains_key(key)
    }

    pub fn get(&self, key: &SiteKey) -> Option<&MacroSite> {
        self.sites.get(key)
    }

    /// Every registered site's key, in `SiteKey` order. Used by the
    /// expander's dependency-probing fixed point, which must keep probing
    /// newly-discovered cross-file sites until no more appear.
    pub fn keys(&self) -> impl Iterator<Item = &SiteKey> {
        self.sites.keys()
    }

    /// Records that `from`'s arguments reference `to`'s result.
    pub fn add_dependency(&mut self, from: &SiteKey, to: SiteKey) -> Result<(), GraphError> {
        let site = self
            .sites
            .get_mut(from)
            .ok_or_else(|| GraphError::UnknownSite(from.clone()))?;
        site.dependencies.insert(to);
        Ok(())
    }

    pub fn set_result(&mut self, key: &SiteKey, result: Expr) -> Result<(), GraphError> {
        let site = self
            .sites
            .get_mut(key)
            .ok_or_else(|| GraphError::UnknownSite(key.clone()))?;
        site.result = Some(result);
        site.computed = true;
        Ok(())
    }

    pub fn get_result(&self, key: &SiteKey) -> Option<&Expr> {
        self.sites.get(key).and_then(|s| s.result.as_ref())
    }

    /// All sites belonging to `file`, in the order they were discovered
    /// (`BTreeMap` iteration order over `SiteKey`, which sorts by the
    /// `<file>:<binding>` string and so is already grouped per file).
    pub fn sites_in<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a MacroSite> {
        self.sites.values().filter(move |s| s.file == file)
    }

    /// Clears every site's computed result, keeping the discovered graph
    /// shape. Used when a cached expansion result turns out stale and the
    /// execution phase needs to run again.
    pub fn reset(&mut self) {
        for site in self.sites.values_mut() {
            site.computed = false;
            site.result = None;
        }
    }

    /// Produces an execution order where every site appears after all
    /// sites it depends on. Deterministic: ties are broken by `SiteKey`
    /// ordering, since iteration walks `self.sites` (a `BTreeMap`) in key
    /// order and visits each site's dependencies before itself.
    pub fn topological_sort(&self) -> Result<Vec<SiteKey>, GraphError> {
        let mut marks: BTreeMap<SiteKey, Mark> = self
            .sites
            .keys()
            .map(|k| (k.clone(), Mark::Unvisited))
            .collect();
        let mut order = Vec::with_capacity(self.sites.len());
        let mut path: Vec<SiteKey> = Vec::new();

        for key in self.sites.keys() {
            if marks[key] == Mark::Unvisited {
                self.visit(key, &mut marks, &mut path, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        key: &SiteKey,
        marks: &mut BTreeMap<SiteKey, Mark>,
        path: &mut Vec<SiteKey>,
        order: &mut Vec<SiteKey>,
    ) -> Result<(), GraphError> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = path.iter().position(|k| k == key).unwrap_or(0);
                let mut cycle: Vec<SiteKey> = path[start..].to_vec();
                cycle.push(key.clone());
                return Err(GraphError::CycleDetected(cycle));
            }
            None => return Err(GraphError::UnknownSite(key.clone())),
            Some(Mark::Unvisited) => {}
        }

        marks.insert(key.clone(), Mark::InProgress);
        path.push(key.clone());

        let site = self
            .sites
            .get(key)
            .expect("key already confirmed present by the mark lookup above");
        for dep in &site.dependencies {
            self.visit(dep, marks, path, order)?;
        }

        path.pop();
        marks.insert(key.clone(), Mark::Done);
        order.push(key.clone());
        Ok(())
    }
}
