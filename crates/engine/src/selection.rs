//! Whitelist selection state and desired-job resolution.
//!
//! A whitelist is a curated set of job designations the user can opt
//! into. The engine keeps one enabled/disabled flag per discovered
//! whitelist and resolves the desired-job set by asking the service,
//! for every enabled whitelist and candidate job, "does this
//! whitelist designate this job?". Selection state is an explicit
//! struct passed by reference into the resolver -- there are no
//! process-wide singletons.

use std::collections::BTreeMap;

use certbox_bus::connector::ServiceBus;
use certbox_core::path::ObjectPath;
use certbox_core::well_known;

use crate::object_tree::{NodeId, ObjectTree};

/// Flattened view of one job object, derived from its job-definition
/// interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    /// The job's bus address.
    pub path: ObjectPath,
    /// Display name from the job definition; falls back to the short
    /// id when the service omits it.
    pub name: String,
    /// Short id, the last segment of the address.
    pub id: String,
    /// Name of the job that generated this one; empty for top-level
    /// jobs.
    pub via: String,
}

impl JobNode {
    /// Derive the flattened view from a discovered object node.
    fn from_tree(tree: &ObjectTree, id: NodeId) -> JobNode {
        let node = tree.node(id);
        let short_id = node.path().last_segment().to_string();
        let bag = node.interface(well_known::JOB_DEFINITION_INTERFACE);
        let name = bag
            .and_then(|b| b.get_str("name").ok())
            .unwrap_or(short_id.as_str())
            .to_string();
        let via = bag
            .and_then(|b| b.get_str("via").ok())
            .unwrap_or_default()
            .to_string();
        JobNode {
            path: node.path().clone(),
            name,
            id: short_id,
            via,
        }
    }
}

/// Children of the `/plainbox/job` subtree, one per job definition.
pub fn job_nodes(tree: &ObjectTree) -> Vec<NodeId> {
    subtree_children(tree, &well_known::jobs_root())
}

/// Children of the `/plainbox/whitelist` subtree.
pub fn whitelist_nodes(tree: &ObjectTree) -> Vec<NodeId> {
    subtree_children(tree, &well_known::whitelists_root())
}

fn subtree_children(tree: &ObjectTree, root: &ObjectPath) -> Vec<NodeId> {
    match tree.find(root) {
        Some(id) => tree.node(id).children().to_vec(),
        None => Vec::new(),
    }
}

/// Flattened job views in discovery order.
pub fn job_views(tree: &ObjectTree) -> Vec<JobNode> {
    job_nodes(tree)
        .into_iter()
        .map(|id| JobNode::from_tree(tree, id))
        .collect()
}

/// Addresses of every discovered job, in discovery order.
pub fn all_jobs(tree: &ObjectTree) -> Vec<ObjectPath> {
    job_nodes(tree)
        .into_iter()
        .map(|id| tree.node(id).path().clone())
        .collect()
}

/// Addresses of the local "generator" jobs -- jobs whose definition
/// carries `plugin = "local"`. These run ahead of the real batch to
/// produce further jobs and via hierarchy information.
pub fn local_jobs(tree: &ObjectTree) -> Vec<ObjectPath> {
    job_nodes(tree)
        .into_iter()
        .filter_map(|id| {
            let node = tree.node(id);
            let bag = node.interface(well_known::JOB_DEFINITION_INTERFACE)?;
            match bag.get_str("plugin") {
                Ok(plugin) if plugin == well_known::LOCAL_PLUGIN => Some(node.path().clone()),
                _ => None,
            }
        })
        .collect()
}

/// Ordered intersection: the members of `subset` that also appear in
/// `desired`, keeping `subset` order.
pub fn filter_jobs(subset: &[ObjectPath], desired: &[ObjectPath]) -> Vec<ObjectPath> {
    subset
        .iter()
        .filter(|p| desired.contains(p))
        .cloned()
        .collect()
}

/// Display name of the job at `path`, if it is a known job.
pub fn job_name(tree: &ObjectTree, path: &ObjectPath) -> Option<String> {
    job_views(tree)
        .into_iter()
        .find(|j| &j.path == path)
        .map(|j| j.name)
}

/// Per-whitelist enabled/disabled flags.
///
/// Seeded once, the first time whitelists are discovered, with every
/// whitelist enabled. User toggles update individual entries; keys
/// that were never seeded are never queried.
#[derive(Debug, Clone, Default)]
pub struct WhitelistSelection {
    entries: BTreeMap<ObjectPath, bool>,
}

impl WhitelistSelection {
    /// An empty, unseeded selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the selection has been seeded yet.
    pub fn is_seeded(&self) -> bool {
        !self.entries.is_empty()
    }

    /// First-time population: one entry per whitelist, all enabled.
    /// Later calls are ignored so user toggles survive rediscovery.
    pub fn seed<I: IntoIterator<Item = ObjectPath>>(&mut self, whitelists: I) {
        if self.is_seeded() {
            return;
        }
        for path in whitelists {
            self.entries.insert(path, true);
        }
    }

    /// Toggle one whitelist.
    pub fn set(&mut self, whitelist: ObjectPath, enabled: bool) {
        self.entries.insert(whitelist, enabled);
    }

    /// Whether a whitelist is currently enabled.
    pub fn is_enabled(&self, whitelist: &ObjectPath) -> bool {
        self.entries.get(whitelist).copied().unwrap_or(false)
    }

    /// Addresses of the enabled whitelists, in address order.
    pub fn enabled(&self) -> Vec<ObjectPath> {
        self.entries
            .iter()
            .filter(|(_, &on)| on)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// All entries for display, in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPath, bool)> {
        self.entries.iter().map(|(p, &on)| (p, on))
    }
}

/// Whitelist display names keyed by address, read from the whitelist
/// interface bags of the discovered tree. Seeds `selection` on first
/// call.
pub fn whitelist_names(
    tree: &ObjectTree,
    selection: &mut WhitelistSelection,
) -> BTreeMap<ObjectPath, String> {
    let mut names = BTreeMap::new();
    let mut discovered = Vec::new();

    for id in whitelist_nodes(tree) {
        let node = tree.node(id);
        let Some(bag) = node.interface(well_known::WHITELIST_INTERFACE) else {
            continue;
        };
        let name = bag
            .get_str("name")
            .unwrap_or_else(|_| node.path().last_segment())
            .to_string();
        names.insert(node.path().clone(), name);
        discovered.push(node.path().clone());
    }

    selection.seed(discovered);
    names
}

/// Resolve the set of jobs designated by the enabled whitelists.
///
/// Queries the service for every enabled whitelist × candidate pair.
/// A job is desired when **any** enabled whitelist designates it;
/// results are ordered by first designation with duplicates
/// suppressed. A failed query counts as "not designated" -- never
/// silently include a job on an ambiguous answer -- and the remaining
/// pairs are still evaluated. This is an
/// O(enabled_whitelists × candidates) sequence of blocking calls.
pub async fn resolve_desired_jobs(
    bus: &dyn ServiceBus,
    selection: &WhitelistSelection,
    candidates: &[ObjectPath],
) -> Vec<ObjectPath> {
    let mut desired: Vec<ObjectPath> = Vec::new();

    for whitelist in selection.enabled() {
        for job in candidates {
            let designated = match bus.designates(&whitelist, job).await {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!(
                        whitelist = %whitelist,
                        job = %job,
                        error = %e,
                        "Designates query failed, treating as not designated",
                    );
                    false
                }
            };

            if designated && !desired.contains(job) {
                desired.push(job.clone());
            }
        }
    }

    desired
}
