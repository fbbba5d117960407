//! A tree implementation backing the node arena of a `Parse`.
//!
//! Nodes are stored in a flat vector and addressed by index, so cloning a
//! parse clones the whole arena in one pass and every internal link (parent,
//! first child, next sibling) survives the copy without re-threading.

use core::ops::Index;
use core::ops::IndexMut;

pub(crate) type NodeId = usize;

#[derive(Clone, Debug)]
struct TreeNode<TreeItem> {
    item: TreeItem,
    parent: NodeId,
    first_child: NodeId,
    next_sibling: NodeId,
}

/// A tree implementation, efficient for bottom-up construction of forests.
#[derive(Clone, Debug)]
pub(crate) struct Tree<TreeItem> {
    nodes: Vec<TreeNode<TreeItem>>,
}

impl<TreeItem> Default for Tree<TreeItem> {
    fn default() -> Self {
        Self { nodes: vec![] }
    }
}

impl<TreeItem> Tree<TreeItem> {
    /// Create a new node with the given item and children (previously added
    /// to the tree).  This way of constructing forces a bottom-up approach:
    /// leaves are added first, then the branch nodes over them.
    pub(crate) fn add_node(&mut self, item: TreeItem, children: &[NodeId]) -> NodeId {
        let mut new_node = TreeNode {
            item,
            parent: 0,
            first_child: 0,
            next_sibling: 0,
        };
        let new_id = self.nodes.len() + 1;
        let mut pointer = &mut new_node.first_child;
        for &child_index in children {
            *pointer = child_index;
            let child = &mut self.nodes[child_index - 1];
            assert!(
                child.parent == 0,
                "children added to a node shall not have a parent yet"
            );
            child.parent = new_id;
            pointer = &mut child.next_sibling;
            assert!(
                *pointer == 0,
                "children added to a node shall not be chained yet"
            );
        }
        self.nodes.push(new_node);
        new_id
    }

    /// Checked accessor to a tree node.
    #[inline]
    fn node(&self, node_id: NodeId) -> &'_ TreeNode<TreeItem> {
        assert!(node_id > 0, "cannot index null node");
        assert!(node_id <= self.nodes.len(), "cannot index outside of tree");
        &self.nodes[node_id - 1]
    }

    /// Checked mutable accessor to a tree node.
    #[inline]
    fn node_mut(&mut self, node_id: NodeId) -> &'_ mut TreeNode<TreeItem> {
        assert!(node_id > 0, "cannot index null node");
        assert!(node_id <= self.nodes.len(), "cannot index outside of tree");
        &mut self.nodes[node_id - 1]
    }

    /// Iterator through the children of the given node.
    pub(crate) fn children_iter(&self, node_id: NodeId) -> SiblingIter<'_, TreeItem> {
        SiblingIter {
            tree: self,
            current_id: self.first_child(node_id),
        }
    }

    /// Returns the next sibling node id, or `None` if this is the last
    /// sibling.  This executes in O(1).
    pub(crate) fn next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        match self.node(node_id).next_sibling {
            0 => None,
            node_id => Some(node_id),
        }
    }

    /// Returns the parent node, if any.
    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        match self.node(node_id).parent {
            0 => None,
            node_id => Some(node_id),
        }
    }

    /// Returns the first child node, if any.
    pub(crate) fn first_child(&self, node_id: NodeId) -> Option<NodeId> {
        match self.node(node_id).first_child {
            0 => None,
            node_id => Some(node_id),
        }
    }

    /// Returns the number of children of the given node.  O(n) in the child
    /// count.
    pub(crate) fn child_count(&self, node_id: NodeId) -> usize {
        self.children_iter(node_id).count()
    }

    /// Total number of nodes in the tree.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl<TreeItem: Clone> Tree<TreeItem> {
    /// Deep-copies the subtree rooted at `root` into `into`, returning the
    /// id of the copied root.  Children are copied before their parent so the
    /// bottom-up `add_node` discipline is preserved.
    pub(crate) fn copy_subtree(&self, root: NodeId, into: &mut Tree<TreeItem>) -> NodeId {
        let children = self
            .children_iter(root)
            .map(|child| self.copy_subtree(child, into))
            .collect::<Vec<_>>();
        into.add_node(self[root].clone(), &children)
    }

    /// Appends every node of `other` to this tree, remapping ids, and
    /// returns the offset to add to an id from `other` to address its copy.
    pub(crate) fn graft(&mut self, other: &Tree<TreeItem>) -> usize {
        let offset = self.len();
        let remap = |id: NodeId| if id == 0 { 0 } else { id + offset };
        for node in &other.nodes {
            self.nodes.push(TreeNode {
                item: node.item.clone(),
                parent: remap(node.parent),
                first_child: remap(node.first_child),
                next_sibling: remap(node.next_sibling),
            });
        }
        offset
    }
}

impl<TreeItem> Index<NodeId> for Tree<TreeItem> {
    type Output = TreeItem;

    fn index(&self, node_id: NodeId) -> &Self::Output {
        &self.node(node_id).item
    }
}

impl<TreeItem> IndexMut<NodeId> for Tree<TreeItem> {
    fn index_mut(&mut self, node_id: NodeId) -> &mut Self::Output {
        &mut self.node_mut(node_id).item
    }
}

/// An iterator through sibling nodes.
#[derive(Debug)]
pub(crate) struct SiblingIter<'a, TreeItem> {
    tree: &'a Tree<TreeItem>,
    current_id: Option<NodeId>,
}

impl<TreeItem> Iterator for SiblingIter<'_, TreeItem> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current_id;
        std::mem::replace(&mut self.current_id, self.tree.next_sibling(current_id?))
    }
}
