//! Pointer-free expression trees.
//!
//! A [`Tree`] is a flat arena of [`Node`]s in postfix order: every node's
//! operands precede it. The first operand (slot 0) is the subtree ending at
//! `i - 1`; each following operand ends just before the previous one starts.
//! Together with each node's subtree size this recovers the whole structure
//! by index arithmetic:
//!
//! ```text
//! mul(add(x0, c0), x1)   prefix:  mul add x0 c0 x1
//!                        stored:  x1 c0 x0 add mul
//!                        sizes:    1  1  1   3   5
//! ```
//!
//! The same index space addresses the columns of
//! [`Values`](crate::buffer::Values) and [`ReverseBuffer`](crate::buffer::ReverseBuffer).

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};

/// A postfix-encoded expression tree.
///
/// Trees are built and edited outside the interpreter, which only ever reads
/// them. Construction through [`Tree::new`] or [`Tree::from_prefix`]
/// establishes the subtree-size invariant; [`Tree::from_raw`] trusts the
/// caller.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree from nodes in storage (postfix) order, recomputing every
    /// subtree size from the arities.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedTree`] if a node has more children than there are
    /// complete subtrees before it, or if the sequence leaves more than one root.
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        let mut tree = Tree { nodes };
        tree.update_sizes()?;
        Ok(tree)
    }

    /// Build a tree from nodes in natural prefix order: root first, operands
    /// left to right, each operand itself in prefix order.
    ///
    /// Reversing a prefix sequence gives exactly the stored layout, with the
    /// first operand adjacent to its parent.
    pub fn from_prefix(mut nodes: Vec<Node>) -> Result<Self> {
        nodes.reverse();
        Self::new(nodes)
    }

    /// Wrap nodes whose sizes are already populated. Nothing is checked; see
    /// [`validate`](Self::validate).
    pub fn from_raw(nodes: Vec<Node>) -> Self {
        Tree { nodes }
    }

    /// Recompute `size` for every node from the arities.
    pub fn update_sizes(&mut self) -> Result<()> {
        let mut open: Vec<u32> = Vec::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let arity = node.arity as usize;
            if arity > open.len() {
                return Err(Error::MalformedTree {
                    index: i,
                    reason: "more children than preceding subtrees",
                });
            }
            let children: u32 = open.drain(open.len() - arity..).sum();
            node.size = children + 1;
            open.push(node.size);
        }
        if open.len() > 1 {
            return Err(Error::MalformedTree {
                index: self.nodes.len() - 1,
                reason: "sequence has more than one root",
            });
        }
        Ok(())
    }

    /// Check the subtree-size invariant without modifying anything:
    /// every node's size is one plus the sizes of its children, and the
    /// root spans the whole array.
    pub fn validate(&self) -> Result<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            let size = node.size as usize;
            if size == 0 || size > i + 1 {
                return Err(Error::MalformedTree {
                    index: i,
                    reason: "subtree size out of range",
                });
            }
            let start = i + 1 - size;
            let mut end = i;
            for _ in 0..node.arity {
                if end <= start {
                    return Err(Error::MalformedTree {
                        index: i,
                        reason: "children overrun subtree",
                    });
                }
                let child = self.nodes[end - 1].size as usize;
                if child == 0 || child > end - start {
                    return Err(Error::MalformedTree {
                        index: i,
                        reason: "children overrun subtree",
                    });
                }
                end -= child;
            }
            if end != start {
                return Err(Error::MalformedTree {
                    index: i,
                    reason: "subtree size disagrees with children",
                });
            }
        }
        if let Some(root) = self.nodes.last() {
            if root.size as usize != self.nodes.len() {
                return Err(Error::MalformedTree {
                    index: self.nodes.len() - 1,
                    reason: "root does not span the tree",
                });
            }
        }
        Ok(())
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slice view of all nodes in storage order.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Position of the root (the last node).
    #[inline]
    pub fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    /// Direct children of node `i` as `(slot, position)` pairs, left to right.
    #[inline]
    pub fn children(&self, i: usize) -> Children<'_> {
        Children {
            nodes: &self.nodes,
            end: i,
            slot: 0,
            remaining: self.nodes[i].arity,
        }
    }

    /// Positions of every node strictly below `i`, in storage order.
    #[inline]
    pub fn descendants(&self, i: usize) -> Range<usize> {
        let size = self.nodes[i].size as usize;
        (i + 1 - size)..i
    }

    /// Positions of the subtree rooted at `i`, including `i`.
    #[inline]
    pub fn subtree(&self, i: usize) -> Range<usize> {
        let size = self.nodes[i].size as usize;
        (i + 1 - size)..(i + 1)
    }

    /// Coefficient slots referenced by the tree, in storage order.
    pub fn coefficient_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(Node::coefficient_slot)
    }

    /// Length the coefficient vector must have: one past the highest slot,
    /// zero if the tree has no coefficients.
    pub fn coefficient_count(&self) -> usize {
        self.coefficient_slots().map(|s| s + 1).max().unwrap_or(0)
    }

    /// Dataset columns referenced by the tree, in storage order.
    pub fn variable_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(Node::variable_column)
    }

    fn fmt_node(&self, i: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[i];
        match node.kind {
            NodeKind::Variable => write!(f, "x{}", node.operand),
            NodeKind::Coefficient => write!(f, "c{}", node.operand),
            NodeKind::Constant => write!(f, "{}", node.value),
            kind => {
                write!(f, "({kind}")?;
                for (_, j) in self.children(i) {
                    f.write_str(" ")?;
                    self.fmt_node(j, f)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Renders the tree as a prefix s-expression, e.g. `(mul (add x0 c0) x1)`.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root() {
            Some(root) => self.fmt_node(root, f),
            None => f.write_str("()"),
        }
    }
}

/// Iterator over the direct children of a node. See [`Tree::children`].
#[derive(Clone, Debug)]
pub struct Children<'a> {
    nodes: &'a [Node],
    /// One past the position where the next child ends.
    end: usize,
    slot: usize,
    remaining: u16,
}

impl Iterator for Children<'_> {
    type Item = (usize, usize);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.end - 1;
        let size = self.nodes[pos].size as usize;
        debug_assert!(size >= 1 && size <= self.end, "subtree size invariant");
        let item = (self.slot, pos);
        self.end -= size;
        self.slot += 1;
        self.remaining -= 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Children<'_> {}
