//! Tri-state test selection tree.
//!
//! The test picker shows suites as interior nodes and individual
//! tests as leaves, each with a check mark. An interior node's state
//! is always a pure function of its children: fully checked when all
//! children are checked, fully unchecked when none are, partially
//! checked otherwise. Toggling any node cascades the new state to
//! every descendant and recomputes every ancestor bottom-up.

use certbox_core::path::ObjectPath;

use crate::hierarchy::{HierarchyId, JobHierarchy};

/// Check mark state of one selection node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    /// Some, but not all, descendant leaves are checked. Interior
    /// nodes only.
    Partial,
    Checked,
}

/// Advisory shown (once per tree) when the user deselects a
/// previously-selected test. Never blocking.
pub const UNCHECK_ADVISORY: &str = "Deselecting a test invalidates a complete certification \
submission. If equipment is missing, skip the individual test during the run instead.";

/// Index of a node within a [`SelectionTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionId(usize);

/// One suite or test entry.
#[derive(Debug)]
struct SelectionNode {
    label: String,
    /// Address of the underlying job; `None` for the hidden root.
    job: Option<ObjectPath>,
    parent: Option<SelectionId>,
    children: Vec<SelectionId>,
    state: CheckState,
}

/// The picker's selection model.
///
/// Holds a hidden root so that top-level suites are ordinary nodes.
/// New nodes start checked, matching the run-everything default of a
/// certification pass.
#[derive(Debug)]
pub struct SelectionTree {
    nodes: Vec<SelectionNode>,
    /// Interaction gate for the presentation layer; mutations are
    /// still accepted while disabled (the front-end greys the picker
    /// out during a run).
    enabled: bool,
    /// Set after the first uncheck advisory so it is not repeated.
    warned: bool,
}

impl SelectionTree {
    const ROOT: SelectionId = SelectionId(0);

    /// An empty tree.
    pub fn new() -> Self {
        Self {
            nodes: vec![SelectionNode {
                label: String::new(),
                job: None,
                parent: None,
                children: Vec::new(),
                state: CheckState::Checked,
            }],
            enabled: true,
            warned: false,
        }
    }

    /// Build a selection tree mirroring a job hierarchy: one entry
    /// per hierarchy node, same nesting, everything checked.
    pub fn from_hierarchy(hierarchy: &JobHierarchy) -> Self {
        let mut tree = Self::new();
        let mut map: Vec<(HierarchyId, SelectionId)> = Vec::new();

        for (hid, _) in hierarchy.flatten() {
            let node = hierarchy.node(hid);
            let parent = node
                .parent()
                .and_then(|p| map.iter().find(|(h, _)| *h == p).map(|(_, s)| *s))
                .unwrap_or(Self::ROOT);
            let sid = tree.add_node(parent, node.name.clone(), node.path.clone());
            map.push((hid, sid));
        }

        tree
    }

    /// Append a top-level suite.
    pub fn add_suite(&mut self, label: impl Into<String>) -> SelectionId {
        self.add_node(Self::ROOT, label.into(), None)
    }

    /// Append a test under a suite.
    pub fn add_test(
        &mut self,
        suite: SelectionId,
        label: impl Into<String>,
        job: ObjectPath,
    ) -> SelectionId {
        self.add_node(suite, label.into(), Some(job))
    }

    fn add_node(
        &mut self,
        parent: SelectionId,
        label: String,
        job: Option<ObjectPath>,
    ) -> SelectionId {
        let id = SelectionId(self.nodes.len());
        self.nodes.push(SelectionNode {
            label,
            job,
            parent: Some(parent),
            children: Vec::new(),
            state: CheckState::Checked,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Top-level entries in insertion order.
    pub fn top_level(&self) -> &[SelectionId] {
        &self.nodes[Self::ROOT.0].children
    }

    /// Children of a node in insertion order.
    pub fn children(&self, id: SelectionId) -> &[SelectionId] {
        &self.nodes[id.0].children
    }

    /// A node's display label.
    pub fn label(&self, id: SelectionId) -> &str {
        &self.nodes[id.0].label
    }

    /// A node's current check state.
    pub fn state(&self, id: SelectionId) -> CheckState {
        self.nodes[id.0].state
    }

    /// Whether interaction is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gate interaction on or off (e.g. while a run is in progress).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check or uncheck a node.
    ///
    /// The new state is applied unconditionally to the node and every
    /// descendant, then every ancestor is recomputed bottom-up from
    /// its children. Returns the advisory text the first time a
    /// previously-checked node is unchecked; later unchecks stay
    /// silent.
    pub fn set_checked(&mut self, id: SelectionId, checked: bool) -> Option<&'static str> {
        let advisory = if !checked
            && self.nodes[id.0].state != CheckState::Unchecked
            && !self.warned
        {
            self.warned = true;
            Some(UNCHECK_ADVISORY)
        } else {
            None
        };

        let state = if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        };
        self.cascade_down(id, state);
        self.recompute_ancestors(id);
        advisory
    }

    /// Check or uncheck every entry at once. Does not trigger the
    /// uncheck advisory -- it exists for the explicit all-on/all-off
    /// controls.
    pub fn select_all(&mut self, select: bool) {
        let state = if select {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        };
        self.cascade_down(Self::ROOT, state);
    }

    /// Addresses of every checked leaf test, in tree order.
    pub fn checked_jobs(&self) -> Vec<ObjectPath> {
        let mut out = Vec::new();
        self.collect_checked(Self::ROOT, &mut out);
        out
    }

    fn collect_checked(&self, id: SelectionId, out: &mut Vec<ObjectPath>) {
        let node = &self.nodes[id.0];
        if node.children.is_empty() {
            if node.state == CheckState::Checked {
                if let Some(job) = &node.job {
                    out.push(job.clone());
                }
            }
            return;
        }
        for child in &node.children {
            self.collect_checked(*child, out);
        }
    }

    fn cascade_down(&mut self, id: SelectionId, state: CheckState) {
        self.nodes[id.0].state = state;
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.cascade_down(child, state);
        }
    }

    fn recompute_ancestors(&mut self, id: SelectionId) {
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            if parent != Self::ROOT {
                self.nodes[parent.0].state = self.state_from_children(parent);
            }
            current = self.nodes[parent.0].parent;
        }
    }

    fn state_from_children(&self, id: SelectionId) -> CheckState {
        let children = &self.nodes[id.0].children;
        let checked = children
            .iter()
            .filter(|c| self.nodes[c.0].state == CheckState::Checked)
            .count();
        let unchecked = children
            .iter()
            .filter(|c| self.nodes[c.0].state == CheckState::Unchecked)
            .count();

        if checked == children.len() {
            CheckState::Checked
        } else if unchecked == children.len() {
            CheckState::Unchecked
        } else {
            CheckState::Partial
        }
    }
}

impl Default for SelectionTree {
    fn default() -> Self {
        Self::new()
    }
}
