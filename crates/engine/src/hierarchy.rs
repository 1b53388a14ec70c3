//! Job display hierarchy reconstruction.
//!
//! The service publishes jobs as a flat list; the parent/child
//! structure the test picker shows is only recorded indirectly, as a
//! `via` attribute naming the job that generated each entry.
//! [`build_hierarchy`] folds those flat via chains back into a tree
//! under one synthetic root.

use certbox_core::path::ObjectPath;

use crate::selection::JobNode;

/// Index of a node within a [`JobHierarchy`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HierarchyId(usize);

/// One entry in the display hierarchy.
#[derive(Debug)]
pub struct HierarchyNode {
    /// Display name copied from the flat job view.
    pub name: String,
    /// Short id copied from the flat job view.
    pub id: String,
    /// The via attribute copied from the flat job view.
    pub via: String,
    /// Address of the underlying job object; `None` only for the
    /// synthetic root.
    pub path: Option<ObjectPath>,
    parent: Option<HierarchyId>,
    children: Vec<HierarchyId>,
}

impl HierarchyNode {
    /// Back-pointer to the parent; `None` for the synthetic root.
    pub fn parent(&self) -> Option<HierarchyId> {
        self.parent
    }

    /// Child nodes in insertion order.
    pub fn children(&self) -> &[HierarchyId] {
        &self.children
    }
}

/// The reconstructed display tree.
///
/// Always holds at least the synthetic root. Built fresh from the
/// current flat job list; never patched incrementally.
#[derive(Debug)]
pub struct JobHierarchy {
    nodes: Vec<HierarchyNode>,
}

impl JobHierarchy {
    /// The synthetic root's id.
    pub const ROOT: HierarchyId = HierarchyId(0);

    fn new() -> Self {
        Self {
            nodes: vec![HierarchyNode {
                name: String::new(),
                id: String::new(),
                via: String::new(),
                path: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Look up a node by arena id.
    pub fn node(&self, id: HierarchyId) -> &HierarchyNode {
        &self.nodes[id.0]
    }

    /// Number of nodes, synthetic root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the hierarchy holds only the synthetic root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth of a node, derived by walking parent links. The
    /// synthetic root has depth 0, top-level jobs depth 1.
    pub fn depth(&self, id: HierarchyId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Pre-order traversal as (id, depth) pairs, root excluded. This
    /// is the order the test picker lists entries in.
    pub fn flatten(&self) -> Vec<(HierarchyId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<HierarchyId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push((id, self.depth(id)));
            for child in self.node(id).children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// The (address, parent address) edge set, for comparing two
    /// hierarchies structurally. The synthetic root appears as a
    /// `None` parent.
    pub fn edges(&self) -> Vec<(ObjectPath, Option<ObjectPath>)> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let path = node.path.clone()?;
                let parent = node
                    .parent
                    .and_then(|p| self.nodes[p.0].path.clone());
                Some((path, parent))
            })
            .collect()
    }

    fn add_child(&mut self, parent: HierarchyId, job: &JobNode) -> HierarchyId {
        let id = HierarchyId(self.nodes.len());
        self.nodes.push(HierarchyNode {
            name: job.name.clone(),
            id: job.id.clone(),
            via: job.via.clone(),
            path: Some(job.path.clone()),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn child_by_path(&self, parent: HierarchyId, path: &ObjectPath) -> Option<HierarchyId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].path.as_ref() == Some(path))
    }
}

/// Reconstruct the display hierarchy from the flat job list.
///
/// For each job, in discovery order: assemble its via chain by
/// repeatedly looking up the job named by the current node's `via`
/// within the flat list, prepending each hit; the chain ends at an
/// empty `via`, at a name with no match in the list (missing parents
/// degrade the job to top level, they are not an error), or at a
/// revisited node (a malformed via cycle would otherwise never
/// terminate). The chain is then merged into the tree from the root,
/// matching existing children by **address** -- two jobs may share a
/// name, but never an address -- and creating nodes for the rest.
/// Rebuilding from an unchanged flat list yields the same edge set.
pub fn build_hierarchy(jobs: &[JobNode]) -> JobHierarchy {
    let mut tree = JobHierarchy::new();

    for job in jobs {
        let mut chain: Vec<&JobNode> = Vec::new();
        let mut next = Some(job);
        while let Some(node) = next {
            if chain.iter().any(|seen| seen.path == node.path) {
                tracing::warn!(job = %node.path, "Via chain revisits a job, truncating");
                break;
            }
            chain.insert(0, node);
            next = if node.via.is_empty() {
                None
            } else {
                jobs.iter().find(|candidate| candidate.name == node.via)
            };
        }

        let mut level = JobHierarchy::ROOT;
        for link in chain {
            level = match tree.child_by_path(level, &link.path) {
                Some(existing) => existing,
                None => tree.add_child(level, link),
            };
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use certbox_core::path::ObjectPath;

    fn job(id: &str, via: &str) -> JobNode {
        JobNode {
            path: ObjectPath::new(format!("/plainbox/job/{id}")),
            name: id.to_string(),
            id: id.to_string(),
            via: via.to_string(),
        }
    }

    fn edge_set(tree: &JobHierarchy) -> Vec<(String, Option<String>)> {
        let mut edges: Vec<_> = tree
            .edges()
            .into_iter()
            .map(|(p, parent)| (p.as_str().to_string(), parent.map(|p| p.as_str().to_string())))
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn single_chain_in_discovery_order() {
        let jobs = vec![job("a", ""), job("b", "a"), job("c", "b")];
        let tree = build_hierarchy(&jobs);

        assert_eq!(tree.len(), 4); // root + 3
        let top = tree.node(JobHierarchy::ROOT).children();
        assert_eq!(top.len(), 1);
        let a = top[0];
        assert_eq!(tree.node(a).id, "a");
        let b = tree.node(a).children()[0];
        assert_eq!(tree.node(b).id, "b");
        let c = tree.node(b).children()[0];
        assert_eq!(tree.node(c).id, "c");
        assert_eq!(tree.depth(c), 3);
    }

    #[test]
    fn chain_is_input_order_independent() {
        let forward = build_hierarchy(&[job("a", ""), job("b", "a"), job("c", "b")]);
        let reversed = build_hierarchy(&[job("c", "b"), job("b", "a"), job("a", "")]);
        assert_eq!(edge_set(&forward), edge_set(&reversed));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let jobs = vec![
            job("storage", ""),
            job("disk_a", "storage"),
            job("disk_b", "storage"),
            job("net", ""),
        ];
        let first = build_hierarchy(&jobs);
        let second = build_hierarchy(&jobs);
        assert_eq!(edge_set(&first), edge_set(&second));
    }

    #[test]
    fn missing_via_parent_degrades_to_top_level() {
        let jobs = vec![job("orphan", "never_generated")];
        let tree = build_hierarchy(&jobs);

        let top = tree.node(JobHierarchy::ROOT).children();
        assert_eq!(top.len(), 1);
        assert_eq!(tree.node(top[0]).id, "orphan");
        assert_eq!(tree.depth(top[0]), 1);
    }

    #[test]
    fn shared_parent_is_not_duplicated() {
        let jobs = vec![job("gen", ""), job("x", "gen"), job("y", "gen")];
        let tree = build_hierarchy(&jobs);

        let top = tree.node(JobHierarchy::ROOT).children();
        assert_eq!(top.len(), 1);
        let gen = top[0];
        assert_eq!(tree.node(gen).children().len(), 2);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn same_name_different_address_stay_distinct() {
        let mut first = job("eth0", "");
        first.name = "network".to_string();
        let mut second = job("eth1", "");
        second.name = "network".to_string();

        let tree = build_hierarchy(&[first, second]);
        // Matching is by address, so both jobs appear at top level.
        assert_eq!(tree.node(JobHierarchy::ROOT).children().len(), 2);
    }

    #[test]
    fn via_cycle_terminates() {
        // a via b, b via a: malformed input, but the builder must not
        // hang and both jobs must still be reachable.
        let jobs = vec![job("a", "b"), job("b", "a")];
        let tree = build_hierarchy(&jobs);

        let addresses: Vec<_> = tree.edges().into_iter().map(|(path, _)| path).collect();
        assert!(addresses.contains(&ObjectPath::new("/plainbox/job/a")));
        assert!(addresses.contains(&ObjectPath::new("/plainbox/job/b")));
    }

    #[test]
    fn flatten_is_pre_order_with_depths() {
        let jobs = vec![job("suite", ""), job("t1", "suite"), job("t2", "suite"), job("solo", "")];
        let tree = build_hierarchy(&jobs);
        let listing: Vec<(String, usize)> = tree
            .flatten()
            .into_iter()
            .map(|(id, depth)| (tree.node(id).id.clone(), depth))
            .collect();
        assert_eq!(
            listing,
            vec![
                ("suite".to_string(), 1),
                ("t1".to_string(), 2),
                ("t2".to_string(), 2),
                ("solo".to_string(), 1),
            ]
        );
    }
}
