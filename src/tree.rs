//! AVL tree over arena-allocated nodes.
//!
//! Nodes live in a [`NodeArena`] and refer to each other by [`NodeId`]
//! (parent, left, right), so the parent/child graph needs no shared ownership.
//! Every node caches the height of its subtree; an absent child counts as
//! height 0 and a leaf has height 1.
//!
//! After each insert or remove the tree walks from the point of change up to
//! the root, recomputing cached heights and rotating wherever the skew
//! (`height(right) - height(left)`) leaves `-1..=1`.

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use tracing::trace;

use crate::arena::{ArenaStats, NodeArena, SlotId};
use crate::compare::{Comparator, NaturalOrder};
use crate::config::{Config, DuplicatePolicy};
use crate::error::{AvlError, Result};
use crate::iter::{Iter, Keys, Values};

/// Handle to a node of an [`AvlTree`].
///
/// A handle is valid until the next `remove` or `clear` on the tree. Removal
/// moves entries between nodes, so an old handle may afterwards point at a
/// different entry or at nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(pub(crate) SlotId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub(crate) fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) height: u8,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V, parent: Option<NodeId>) -> Self {
        Self {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 1,
        }
    }

    #[inline]
    pub(crate) fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    fn child_mut(&mut self, side: Side) -> &mut Option<NodeId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

pub(crate) type Nodes<K, V> = NodeArena<Node<K, V>>;

/// Follows `side` children from `id` to the end of the chain.
pub(crate) fn extreme<K, V>(nodes: &Nodes<K, V>, mut id: NodeId, side: Side) -> NodeId {
    while let Some(child) = nodes[id.0].child(side) {
        id = child;
    }
    id
}

/// In-order neighbour of `id`: the successor for `Side::Right`, the
/// predecessor for `Side::Left`.
pub(crate) fn step<K, V>(nodes: &Nodes<K, V>, id: NodeId, side: Side) -> Option<NodeId> {
    if let Some(child) = nodes[id.0].child(side) {
        return Some(extreme(nodes, child, side.opposite()));
    }
    // Climb until we arrive from the opposite side.
    let mut current = id;
    while let Some(parent) = nodes[current.0].parent {
        if nodes[parent.0].child(side.opposite()) == Some(current) {
            return Some(parent);
        }
        current = parent;
    }
    None
}

enum Probe {
    Found(NodeId),
    /// Key is absent; it belongs on the given side of the given node, or at
    /// the root when the tree is empty.
    Vacant(Option<(NodeId, Side)>),
}

/// An ordered map kept balanced by AVL rotations.
///
/// Keys are ordered by the comparator `C` supplied at construction
/// ([`NaturalOrder`] by default). Values may be owned or borrowed: storing
/// `&'a T` (or `Rc<T>`) keeps the values managed outside the tree.
///
/// The tree is single-threaded. To share it, wrap the whole tree in one lock;
/// rotations touch several nodes at once, so nothing finer-grained is safe.
///
/// # Example
///
/// ```rust
/// use avl_slab::{AvlError, AvlTree};
///
/// let mut tree = AvlTree::new();
/// for key in [5, 3, 8, 1, 4] {
///     tree.insert(key, key * 10).unwrap();
/// }
/// assert_eq!(tree.height(), 3);
/// assert_eq!(tree.insert(3, 0), Err(AvlError::DuplicateKey));
///
/// let keys: Vec<_> = tree.keys().copied().collect();
/// assert_eq!(keys, [1, 3, 4, 5, 8]);
/// ```
#[derive(Clone)]
pub struct AvlTree<K, V, C = NaturalOrder> {
    pub(crate) nodes: Nodes<K, V>,
    pub(crate) root: Option<NodeId>,
    pub(crate) len: usize,
    cmp: C,
    duplicates: DuplicatePolicy,
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Creates an empty tree ordered by `K`'s [`Ord`] implementation.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_config_and_comparator(config, NaturalOrder)
    }
}

impl<K, V, C> AvlTree<K, V, C> {
    /// Creates an empty tree ordered by `cmp`.
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            len: 0,
            cmp,
            duplicates: DuplicatePolicy::default(),
        }
    }

    pub fn with_config_and_comparator(config: Config, cmp: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            nodes: NodeArena::with_config(config.arena)?,
            root: None,
            len: 0,
            cmp,
            duplicates: config.duplicate_policy,
        })
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; 0 when empty.
    #[inline]
    pub fn height(&self) -> usize {
        usize::from(self.height_of(self.root))
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Bookkeeping of the node arena backing this tree.
    pub fn arena_stats(&self) -> ArenaStats {
        self.nodes.stats()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node with the smallest key.
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|root| extreme(&self.nodes, root, Side::Left))
    }

    /// Node with the largest key.
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|root| extreme(&self.nodes, root, Side::Right))
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.first().and_then(|id| self.entry(id))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.last().and_then(|id| self.entry(id))
    }

    /// Node holding the next-lower key, if any.
    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?;
        step(&self.nodes, id, Side::Left)
    }

    /// Node holding the next-higher key, if any.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?;
        step(&self.nodes, id, Side::Right)
    }

    pub fn key(&self, id: NodeId) -> Option<&K> {
        self.nodes.get(id.0).map(|node| &node.key)
    }

    pub fn value(&self, id: NodeId) -> Option<&V> {
        self.nodes.get(id.0).map(|node| &node.value)
    }

    pub fn value_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.nodes.get_mut(id.0).map(|node| &mut node.value)
    }

    pub fn entry(&self, id: NodeId) -> Option<(&K, &V)> {
        self.nodes.get(id.0).map(|node| (&node.key, &node.value))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.right
    }

    /// Cached height of the subtree rooted at `id`.
    pub fn node_height(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(id.0).map(|node| usize::from(node.height))
    }

    /// In-order iterator over `(key, value)` pairs.
    ///
    /// The iterator walks successor links lazily; calling `iter` again starts
    /// a fresh pass.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.nodes, self.first(), self.last(), self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    /// Removes every entry and frees the arena's backing blocks.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id.0]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id.0]
    }

    #[inline]
    fn height_of(&self, id: Option<NodeId>) -> u8 {
        id.map_or(0, |id| self.node(id).height)
    }

    fn update_height(&mut self, id: NodeId) {
        let node = self.node(id);
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.node_mut(id).height = height;
    }

    fn skew(&self, id: NodeId) -> i32 {
        let node = self.node(id);
        i32::from(self.height_of(node.right)) - i32::from(self.height_of(node.left))
    }

    /// Points `parent`'s link to `old` (or the root, if `parent` is `None`)
    /// at `new` instead.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let node = self.node_mut(parent);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
    }

    /// Rotates the subtree at `pivot` towards `dir`, promoting the child on
    /// the other side. Returns the new subtree root.
    fn rotate(&mut self, pivot: NodeId, dir: Side) -> NodeId {
        let up = dir.opposite();
        let Some(promoted) = self.node(pivot).child(up) else {
            return pivot;
        };
        let parent = self.node(pivot).parent;
        self.replace_child(parent, pivot, Some(promoted));

        let inner = self.node(promoted).child(dir);
        *self.node_mut(pivot).child_mut(up) = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(pivot);
        }

        *self.node_mut(promoted).child_mut(dir) = Some(pivot);
        self.node_mut(promoted).parent = parent;
        self.node_mut(pivot).parent = Some(promoted);

        self.update_height(pivot);
        self.update_height(promoted);
        trace!(?pivot, ?promoted, ?dir, "rotated");
        promoted
    }

    /// Restores heights and balance on the path from `from` to the root.
    fn rebalance(&mut self, from: NodeId) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            self.update_height(id);
            let skew = self.skew(id);
            let top = if skew > 1 {
                if let Some(right) = self.node(id).right {
                    if self.skew(right) < 0 {
                        self.rotate(right, Side::Right);
                    }
                }
                self.rotate(id, Side::Left)
            } else if skew < -1 {
                if let Some(left) = self.node(id).left {
                    if self.skew(left) > 0 {
                        self.rotate(left, Side::Left);
                    }
                }
                self.rotate(id, Side::Right)
            } else {
                id
            };
            cursor = self.node(top).parent;
        }
    }

    fn swap_payload(&mut self, a: NodeId, b: NodeId) {
        let (x, y) = self.nodes.pair_mut(a.0, b.0);
        mem::swap(&mut x.key, &mut y.key);
        mem::swap(&mut x.value, &mut y.value);
    }
}

impl<K, V, C: Comparator<K>> AvlTree<K, V, C> {
    fn probe(&self, key: &K) -> Probe {
        let mut parent = None;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let side = match self.cmp.compare(key, &self.node(id).key) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return Probe::Found(id),
            };
            parent = Some((id, side));
            cursor = self.node(id).child(side);
        }
        Probe::Vacant(parent)
    }

    /// Locates the node holding `key`.
    pub fn find(&self, key: &K) -> Result<NodeId> {
        match self.probe(key) {
            Probe::Found(id) => Ok(id),
            Probe::Vacant(_) => Err(AvlError::KeyNotFound),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.find(key).ok()?;
        Some(&self.node(id).value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.find(key).ok()?;
        Some(&mut self.node_mut(id).value)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let id = self.find(key).ok()?;
        self.entry(id)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_ok()
    }

    /// Inserts `key` with `value`.
    ///
    /// Returns `Ok(None)` for a new key. For a key that is already present the
    /// outcome depends on the tree's [`DuplicatePolicy`]: `Reject` returns
    /// [`AvlError::DuplicateKey`] and leaves the tree as it was, `Overwrite`
    /// swaps in the new value and returns the old one.
    ///
    /// Fails with [`AvlError::AllocationFailure`] if the arena cannot provide a
    /// node; the tree is unchanged in that case too.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let parent = match self.probe(&key) {
            Probe::Found(id) => {
                return match self.duplicates {
                    DuplicatePolicy::Reject => Err(AvlError::DuplicateKey),
                    DuplicatePolicy::Overwrite => {
                        Ok(Some(mem::replace(&mut self.node_mut(id).value, value)))
                    }
                };
            }
            Probe::Vacant(parent) => parent,
        };

        let node = Node::leaf(key, value, parent.map(|(id, _)| id));
        let id = NodeId(self.nodes.acquire(node)?);
        match parent {
            None => self.root = Some(id),
            Some((parent, side)) => {
                *self.node_mut(parent).child_mut(side) = Some(id);
                self.rebalance(parent);
            }
        }
        self.len += 1;
        Ok(None)
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key` and returns the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Result<(K, V)> {
        let mut target = self.find(key)?;

        // Sink the entry to a leaf by trading payloads with the predecessor
        // (or the successor when there is no left subtree). No subtree moves.
        loop {
            let node = self.node(target);
            let side = if node.left.is_some() {
                Side::Left
            } else if node.right.is_some() {
                Side::Right
            } else {
                break;
            };
            let Some(neighbour) = step(&self.nodes, target, side) else {
                break;
            };
            self.swap_payload(target, neighbour);
            target = neighbour;
        }

        let parent = self.node(target).parent;
        self.replace_child(parent, target, None);
        if let Some(parent) = parent {
            self.rebalance(parent);
        }

        let node = self.nodes.release(target.0);
        self.len -= 1;
        Ok((node.key, node.value))
    }
}

impl<K: Ord, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for AvlTree<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, C> IntoIterator for &'a AvlTree<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
