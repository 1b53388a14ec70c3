//! Remote object tree discovery.
//!
//! The test service exposes its jobs, whitelists, and sessions as a
//! hierarchy of addressable objects. [`ObjectTree::discover`] walks
//! that hierarchy once, depth-first in pre-order, and materialises it
//! as an arena tree: children are owned by their parent's child list,
//! parents are reachable through non-owning arena ids. The tree is
//! never patched in place -- after a local-job batch changes the
//! service's objects, the engine throws the tree away and discovers a
//! fresh one.

use std::collections::BTreeMap;

use certbox_bus::connector::ServiceBus;
use certbox_core::path::ObjectPath;
use certbox_core::properties::PropertyBag;
use certbox_core::well_known;

/// Index of a node within an [`ObjectTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One addressable object mirrored from the service.
#[derive(Debug)]
pub struct ObjectNode {
    path: ObjectPath,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    interfaces: BTreeMap<String, PropertyBag>,
}

impl ObjectNode {
    /// The object's bus address.
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Back-pointer to the parent node; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in discovery order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The property bag attached under `interface`, if any.
    pub fn interface(&self, interface: &str) -> Option<&PropertyBag> {
        self.interfaces.get(interface)
    }

    /// All attached interfaces, keyed by name.
    pub fn interfaces(&self) -> &BTreeMap<String, PropertyBag> {
        &self.interfaces
    }
}

/// A snapshot of the service's object hierarchy.
#[derive(Debug)]
pub struct ObjectTree {
    nodes: Vec<ObjectNode>,
}

impl ObjectTree {
    /// The root node's id. The root always exists and has address `/`
    /// (or whatever root address discovery started from).
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up a node by arena id.
    pub fn node(&self, id: NodeId) -> &ObjectNode {
        &self.nodes[id.0]
    }

    /// Total number of discovered objects.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Find the node with the given address, if discovered.
    pub fn find(&self, path: &ObjectPath) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| &n.path == path)
            .map(NodeId)
    }

    /// Iterate all nodes in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ObjectNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Discover the object hierarchy exposed by `bus`, starting at
    /// `root`.
    ///
    /// Each object is introspected once: its non-reflection interfaces
    /// are fetched and attached as property bags (an interface whose
    /// fetch yields an empty bag is skipped entirely), and its
    /// children are appended in the order the service lists them. A
    /// failed introspection or property fetch degrades that one node --
    /// it stays in the tree with whatever was gathered before the
    /// failure -- and is logged rather than propagated. Discovery is
    /// best-effort and never caches across calls.
    pub async fn discover(bus: &dyn ServiceBus, root: ObjectPath) -> ObjectTree {
        let mut tree = ObjectTree {
            nodes: vec![ObjectNode {
                path: root,
                parent: None,
                children: Vec::new(),
                interfaces: BTreeMap::new(),
            }],
        };

        // Explicit work stack; children are pushed in reverse so the
        // walk visits them depth-first in pre-order.
        let mut stack = vec![NodeId(0)];

        while let Some(id) = stack.pop() {
            let path = tree.nodes[id.0].path.clone();

            let info = match bus.introspect(&path).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(
                        path = %path,
                        error = %e,
                        "Introspection failed, node left empty",
                    );
                    continue;
                }
            };

            for interface in &info.interfaces {
                if well_known::is_reflection_interface(interface) {
                    continue;
                }
                match bus.get_all_properties(&path, interface).await {
                    Ok(bag) if bag.is_empty() => {
                        tracing::debug!(
                            path = %path,
                            interface = %interface,
                            "Interface has no properties, skipped",
                        );
                    }
                    Ok(bag) => {
                        tree.nodes[id.0].interfaces.insert(interface.clone(), bag);
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path,
                            interface = %interface,
                            error = %e,
                            "Property fetch failed, interface skipped",
                        );
                    }
                }
            }

            let first_child = tree.nodes.len();
            for name in &info.children {
                let child_path = path.child(name);
                let child_id = NodeId(tree.nodes.len());
                tree.nodes.push(ObjectNode {
                    path: child_path,
                    parent: Some(id),
                    children: Vec::new(),
                    interfaces: BTreeMap::new(),
                });
                tree.nodes[id.0].children.push(child_id);
            }
            for offset in (first_child..tree.nodes.len()).rev() {
                stack.push(NodeId(offset));
            }
        }

        tracing::debug!(objects = tree.len(), "Object tree discovered");
        tree
    }
}
