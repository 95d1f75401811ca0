// AVL-balanced ordered map with navigable sub-map views (§4.D).
//
// Rotation and rebalance algorithms transcribed in structure from
// `original_source/src/coherence/util/TreeMap.cpp` (`rotate`,
// `doubleRotate`, `adjustDoubleBalance`, `balancedInsertion`,
// `balancePostRemove`). Node storage style (owned arena, index-based
// parent/left/right links instead of raw pointers) is grounded on
// `harborgrid-justin-rusty-db/src/index/btree.rs`'s node-ref convention,
// adapted here to single-key AVL nodes behind an arena rather than
// `Arc<RwLock<Node>>`: §5 declares `TreeMap` is not itself thread-safe, so
// there is nothing here for a lock to protect — the indexing layer
// synchronizes it externally when used as an ordered inverse index.
//
// Per-node storage lives in an arena (`Vec<Option<Node<K, V>>>` plus a free
// list) rather than `Box`/raw-pointer links, since the upward rebalance
// walk needs a mutable parent back-pointer that outlives any single
// `&mut` borrow of a child — the classic case where an index-based arena
// is the safe-Rust answer to what C++ expresses with raw back-pointers.

use crate::error::{CacheError, Result};
use std::cmp::Ordering as CmpOrdering;
use parking_lot::Mutex;
use std::sync::Arc;

type NodeId = usize;
type Comparator<K> = Arc<dyn Fn(&K, &K) -> CmpOrdering + Send + Sync>;

struct Node<K, V> {
    key: K,
    value: V,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    balance: i8,
}

struct Inner<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    size: usize,
    comparator: Option<Comparator<K>>,
}

impl<K, V> Inner<K, V> {
    fn compare(&self, a: &K, b: &K) -> CmpOrdering
    where
        K: Ord,
    {
        match &self.comparator {
            Some(cmp) => cmp(a, b),
            None => a.cmp(b),
        }
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id] = None;
        self.free.push(id);
    }

    /// Recomputes subtree height from scratch and checks it against every
    /// node's stored `balance` factor, independent of the incremental
    /// bookkeeping `balanced_insertion`/`balance_post_remove` perform.
    #[cfg(test)]
    fn height(&self, node: Option<NodeId>) -> i64 {
        match node {
            None => 0,
            Some(id) => 1 + self.height(self.node(id).left).max(self.height(self.node(id).right)),
        }
    }

    #[cfg(test)]
    fn is_balanced(&self, node: Option<NodeId>) -> bool {
        match node {
            None => true,
            Some(id) => {
                let n = self.node(id);
                let diff = self.height(n.right) - self.height(n.left);
                diff.unsigned_abs() <= 1 && n.balance as i64 == diff && self.is_balanced(n.left) && self.is_balanced(n.right)
            }
        }
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.nodes[id].as_ref().expect("live node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.nodes[id].as_mut().expect("live node id")
    }

    /// `replace(A, B)`: splice `B` into `A`'s position under `A`'s parent.
    fn replace(&mut self, a: NodeId, b: Option<NodeId>) -> Option<NodeId> {
        let parent = self.node(a).parent;
        match parent {
            None => self.head = b,
            Some(p) => {
                if self.node(p).left == Some(a) {
                    self.node_mut(p).left = b;
                } else {
                    self.node_mut(p).right = b;
                }
            }
        }
        if let Some(b) = b {
            self.node_mut(b).parent = parent;
        }
        parent
    }

    /// `adopt`: set `node`'s left (if `left`) or right child to `child`,
    /// fixing up `child`'s parent pointer.
    fn adopt(&mut self, node: NodeId, child: Option<NodeId>, left: bool) {
        if left {
            self.node_mut(node).left = child;
        } else {
            self.node_mut(node).right = child;
        }
        if let Some(child) = child {
            self.node_mut(child).parent = Some(node);
        }
    }

    fn rotate(&mut self, node: NodeId, left: bool) -> NodeId {
        let parent = self.node(node).parent;
        let child = if left {
            self.node(node).right.expect("rotation child present")
        } else {
            self.node(node).left.expect("rotation child present")
        };
        let grand = if left {
            self.node(child).left
        } else {
            self.node(child).right
        };

        self.replace(child, grand);
        self.adopt(child, Some(node), left);

        self.node_mut(node).parent = parent;
        self.replace(node, Some(child));
        self.node_mut(node).parent = Some(child);
        child
    }

    fn double_rotate(&mut self, node: NodeId, left: bool) -> NodeId {
        let inner_child = if left {
            self.node(node).right.expect("double rotation child")
        } else {
            self.node(node).left.expect("double rotation child")
        };
        self.rotate(inner_child, !left);
        self.rotate(node, left)
    }

    fn adjust_double_balance(&mut self, node: NodeId, child: NodeId, bal: i8) {
        let grand = if Some(child) == self.node(node).left {
            self.node(child).right.expect("grandchild present")
        } else {
            self.node(child).left.expect("grandchild present")
        };
        let grand_balance = self.node(grand).balance;
        if grand_balance == 0 {
            self.node_mut(node).balance = 0;
            self.node_mut(child).balance = 0;
        } else if grand_balance == bal {
            self.node_mut(node).balance = -bal;
            self.node_mut(child).balance = 0;
        } else {
            self.node_mut(node).balance = 0;
            self.node_mut(child).balance = bal;
        }
        self.node_mut(grand).balance = 0;
    }

    fn find_insertion_point(&self, key: &K) -> Option<NodeId>
    where
        K: Ord,
    {
        let mut current = self.head?;
        loop {
            match self.compare(key, &self.node(current).key) {
                CmpOrdering::Greater => match self.node(current).right {
                    Some(next) => current = next,
                    None => return Some(current),
                },
                CmpOrdering::Less => match self.node(current).left {
                    Some(next) => current = next,
                    None => return Some(current),
                },
                CmpOrdering::Equal => return Some(current),
            }
        }
    }

    fn find(&self, key: &K) -> Option<NodeId>
    where
        K: Ord,
    {
        let mut current = self.head;
        while let Some(id) = current {
            match self.compare(key, &self.node(id).key) {
                CmpOrdering::Greater => current = self.node(id).right,
                CmpOrdering::Less => current = self.node(id).left,
                CmpOrdering::Equal => return Some(id),
            }
        }
        None
    }

    fn min_from(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.node(id).left {
            id = left;
        }
        id
    }

    fn max_from(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self.node(id).right {
            id = right;
        }
        id
    }

    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.node(id).right {
            return Some(self.min_from(right));
        }
        let mut child = id;
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if self.node(p).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(left) = self.node(id).left {
            return Some(self.max_from(left));
        }
        let mut child = id;
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if self.node(p).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// `balancedInsertion`: link `child` under `parent` and rebalance
    /// upward.
    fn balanced_insertion(&mut self, parent: Option<NodeId>, child: NodeId)
    where
        K: Ord,
    {
        let mut parent = match parent {
            None => {
                self.head = Some(child);
                self.size = 1;
                return;
            }
            Some(p) => p,
        };

        let went_left = self.compare(&self.node(child).key, &self.node(parent).key) == CmpOrdering::Less;
        self.adopt(parent, Some(child), went_left);
        self.node_mut(parent).balance += if went_left { -1 } else { 1 };
        self.size += 1;

        let mut child = child;
        loop {
            match self.node(parent).balance {
                0 => return,
                -1 | 1 => {
                    child = parent;
                    match self.node(child).parent {
                        None => return,
                        Some(p) => {
                            parent = p;
                            let delta = if self.node(parent).left == Some(child) {
                                -1
                            } else {
                                1
                            };
                            self.node_mut(parent).balance += delta;
                            continue;
                        }
                    }
                }
                -2 | 2 => {
                    let left_child = self.node(parent).left == Some(child);
                    let bal: i8 = if left_child { -1 } else { 1 };
                    if self.node(child).balance == bal {
                        self.node_mut(parent).balance = 0;
                        self.node_mut(child).balance = 0;
                        self.rotate(parent, !left_child);
                    } else {
                        self.adjust_double_balance(parent, child, bal);
                        self.double_rotate(parent, !left_child);
                    }
                    return;
                }
                _ => unreachable!("AVL balance factor escaped {{-2..=2}}"),
            }
        }
    }

    /// `balancePostRemove`: rebalance upward from `pruned`, whose
    /// `pruned_left` subtree just shrank.
    fn balance_post_remove(&mut self, mut pruned: NodeId, mut pruned_left: bool) {
        loop {
            self.node_mut(pruned).balance += if pruned_left { 1 } else { -1 };
            match self.node(pruned).balance {
                -1 | 1 => return,
                -2 | 2 => {
                    let (child, bal): (NodeId, i8) = if pruned_left {
                        (self.node(pruned).right.expect("rebalance child"), -1)
                    } else {
                        (self.node(pruned).left.expect("rebalance child"), 1)
                    };
                    if self.node(child).balance == -bal {
                        self.node_mut(pruned).balance = 0;
                        self.node_mut(child).balance = 0;
                        pruned = self.rotate(pruned, pruned_left);
                    } else if self.node(child).balance == bal {
                        self.adjust_double_balance(pruned, child, -bal);
                        pruned = self.double_rotate(pruned, pruned_left);
                    } else {
                        self.node_mut(pruned).balance = -bal;
                        self.node_mut(child).balance = bal;
                        self.rotate(pruned, pruned_left);
                        return;
                    }
                    match self.node(pruned).parent {
                        None => return,
                        Some(p) => {
                            pruned_left = self.node(p).left == Some(pruned);
                            pruned = p;
                            continue;
                        }
                    }
                }
                0 => match self.node(pruned).parent {
                    None => return,
                    Some(p) => {
                        pruned_left = self.node(p).left == Some(pruned);
                        pruned = p;
                        continue;
                    }
                },
                _ => unreachable!("AVL balance factor escaped {{-2..=2}}"),
            }
        }
    }

    /// `removeNode`: structural removal of `id`, rebalancing upward.
    fn remove_node(&mut self, id: NodeId)
    where
        K: Ord,
    {
        let (left, right) = (self.node(id).left, self.node(id).right);
        if left.is_none() || right.is_none() {
            let child = left.or(right);
            if let Some(parent) = self.replace(id, child) {
                let went_left = self.compare(&self.node(id).key, &self.node(parent).key) == CmpOrdering::Less;
                self.balance_post_remove(parent, went_left);
            }
        } else {
            let mut heir = right.unwrap();
            while let Some(l) = self.node(heir).left {
                heir = l;
            }
            self.node_mut(heir).balance = self.node(id).balance;

            if self.node(heir).parent == Some(id) {
                let heir_left = self.node(id).left;
                self.adopt(heir, heir_left, true);
                self.replace(id, Some(heir));
                self.balance_post_remove(heir, false);
            } else {
                let heir_parent = self.node(heir).parent.expect("heir has a parent");
                let heir_right = self.node(heir).right;
                self.adopt(heir_parent, heir_right, true);
                let (id_left, id_right) = (self.node(id).left, self.node(id).right);
                self.adopt(heir, id_left, true);
                self.adopt(heir, id_right, false);
                let pruned = heir_parent;
                self.replace(id, Some(heir));
                self.balance_post_remove(pruned, true);
            }
        }

        self.node_mut(id).parent = None;
        self.node_mut(id).left = None;
        self.node_mut(id).right = None;
        self.size -= 1;
    }
}

/// AVL range bound for [`TreeMap::sub_map`] / view construction.
#[derive(Clone)]
pub enum Endpoint<K> {
    Unbounded,
    Inclusive(K),
    Exclusive(K),
}

/// A shared, self-balancing ordered map (§4.D).
///
/// Not `Send`/`Sync`: §5 states `TreeMap` is not thread-safe by itself.
/// `index::simple_map_index` wraps it in a `parking_lot::Mutex` when it is
/// used as an ordered inverse index.
pub struct TreeMap<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    lower: Endpoint<K>,
    upper: Endpoint<K>,
}

impl<K: Ord + Clone, V: Clone> TreeMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                nodes: Vec::new(),
                free: Vec::new(),
                head: None,
                size: 0,
                comparator: None,
            })),
            lower: Endpoint::Unbounded,
            upper: Endpoint::Unbounded,
        }
    }

    pub fn with_comparator(comparator: impl Fn(&K, &K) -> CmpOrdering + Send + Sync + 'static) -> Self {
        let mut map = Self::new();
        map.inner.lock().comparator = Some(Arc::new(comparator));
        map
    }

    fn in_bounds(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        let above_lower = match &self.lower {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(b) => inner.compare(key, b) != CmpOrdering::Less,
            Endpoint::Exclusive(b) => inner.compare(key, b) == CmpOrdering::Greater,
        };
        let below_upper = match &self.upper {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(b) => inner.compare(key, b) != CmpOrdering::Greater,
            Endpoint::Exclusive(b) => inner.compare(key, b) == CmpOrdering::Less,
        };
        above_lower && below_upper
    }

    /// `O(1)` for the whole map, reading the arena's tracked `size`
    /// directly; a bounded sub-map view still walks its range, since the
    /// tracked counter counts the entire underlying tree rather than what
    /// falls inside the view's bounds.
    pub fn len(&self) -> usize {
        match (&self.lower, &self.upper) {
            (Endpoint::Unbounded, Endpoint::Unbounded) => self.inner.lock().size,
            _ => self.iter_keys().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if !self.in_bounds(key) {
            return None;
        }
        let inner = self.inner.lock();
        inner.find(key).map(|id| inner.node(id).value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces; fails with [`CacheError::IllegalArgument`] if
    /// `key` falls outside this view's bounds (§4.D, §7).
    pub fn put(&self, key: K, value: V) -> Result<Option<V>> {
        if !self.in_bounds(&key) {
            return Err(CacheError::IllegalArgument(
                "key outside sub-map view range".into(),
            ));
        }
        let mut inner = self.inner.lock();
        match inner.find(&key) {
            Some(id) => {
                let prior = std::mem::replace(&mut inner.node_mut(id).value, value);
                Ok(Some(prior))
            }
            None => {
                let parent = inner.find_insertion_point(&key);
                let node = Node {
                    key,
                    value,
                    parent,
                    left: None,
                    right: None,
                    balance: 0,
                };
                let id = inner.alloc(node);
                inner.balanced_insertion(parent, id);
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        if !self.in_bounds(key) {
            return None;
        }
        let mut inner = self.inner.lock();
        let id = inner.find(key)?;
        let value = inner.node(id).value.clone();
        inner.remove_node(id);
        inner.free_node(id);
        Some(value)
    }

    /// Removes and returns the smallest key, or `None` if empty.
    pub fn poll_first_entry(&self) -> Option<(K, V)> {
        let (id, key, value) = {
            let inner = self.inner.lock();
            let id = self.first_id(&inner)?;
            (id, inner.node(id).key.clone(), inner.node(id).value.clone())
        };
        let mut inner = self.inner.lock();
        inner.remove_node(id);
        inner.free_node(id);
        Some((key, value))
    }

    pub fn poll_last_entry(&self) -> Option<(K, V)> {
        let (id, key, value) = {
            let inner = self.inner.lock();
            let id = self.last_id(&inner)?;
            (id, inner.node(id).key.clone(), inner.node(id).value.clone())
        };
        let mut inner = self.inner.lock();
        inner.remove_node(id);
        inner.free_node(id);
        Some((key, value))
    }

    fn first_id(&self, inner: &Inner<K, V>) -> Option<NodeId> {
        let mut id = self.lower_entry_id(inner)?;
        loop {
            if self.node_in_bounds(inner, id) {
                return Some(id);
            }
            id = inner.successor(id)?;
        }
    }

    fn last_id(&self, inner: &Inner<K, V>) -> Option<NodeId> {
        let mut id = inner.head.map(|h| inner.max_from(h))?;
        loop {
            if self.node_in_bounds(inner, id) {
                return Some(id);
            }
            id = inner.predecessor(id)?;
        }
    }

    fn lower_entry_id(&self, inner: &Inner<K, V>) -> Option<NodeId> {
        inner.head.map(|h| inner.min_from(h))
    }

    fn node_in_bounds(&self, inner: &Inner<K, V>, id: NodeId) -> bool {
        let key = &inner.node(id).key;
        let above_lower = match &self.lower {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(b) => inner.compare(key, b) != CmpOrdering::Less,
            Endpoint::Exclusive(b) => inner.compare(key, b) == CmpOrdering::Greater,
        };
        let below_upper = match &self.upper {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(b) => inner.compare(key, b) != CmpOrdering::Greater,
            Endpoint::Exclusive(b) => inner.compare(key, b) == CmpOrdering::Less,
        };
        above_lower && below_upper
    }

    pub fn first_key(&self) -> Result<K> {
        let inner = self.inner.lock();
        self.first_id(&inner)
            .map(|id| inner.node(id).key.clone())
            .ok_or_else(|| CacheError::NoSuchElement("first_key on empty map or view".into()))
    }

    pub fn last_key(&self) -> Result<K> {
        let inner = self.inner.lock();
        self.last_id(&inner)
            .map(|id| inner.node(id).key.clone())
            .ok_or_else(|| CacheError::NoSuchElement("last_key on empty map or view".into()))
    }

    /// Strict successor of `key`, or `None` if there is none.
    pub fn higher_key(&self, key: &K) -> Option<K> {
        let inner = self.inner.lock();
        let mut current = inner.head;
        let mut best: Option<NodeId> = None;
        while let Some(id) = current {
            if inner.compare(&inner.node(id).key, key) == CmpOrdering::Greater {
                best = Some(id);
                current = inner.node(id).left;
            } else {
                current = inner.node(id).right;
            }
        }
        best.filter(|&id| self.node_in_bounds(&inner, id))
            .map(|id| inner.node(id).key.clone())
    }

    /// Strict predecessor of `key`, or `None` if there is none.
    pub fn lower_key(&self, key: &K) -> Option<K> {
        let inner = self.inner.lock();
        let mut current = inner.head;
        let mut best: Option<NodeId> = None;
        while let Some(id) = current {
            if inner.compare(&inner.node(id).key, key) == CmpOrdering::Less {
                best = Some(id);
                current = inner.node(id).right;
            } else {
                current = inner.node(id).left;
            }
        }
        best.filter(|&id| self.node_in_bounds(&inner, id))
            .map(|id| inner.node(id).key.clone())
    }

    /// Smallest key `>= key`.
    pub fn ceiling_key(&self, key: &K) -> Option<K> {
        if self.contains_key(key) {
            return Some(key.clone());
        }
        self.higher_key(key)
    }

    /// Largest key `<= key`.
    pub fn floor_key(&self, key: &K) -> Option<K> {
        if self.contains_key(key) {
            return Some(key.clone());
        }
        self.lower_key(key)
    }

    fn iter_keys(&self) -> impl Iterator<Item = K> + '_ {
        let inner = self.inner.lock();
        let mut keys = Vec::new();
        let mut current = self.first_id(&inner);
        while let Some(id) = current {
            keys.push(inner.node(id).key.clone());
            current = inner.successor(id).filter(|&n| self.node_in_bounds(&inner, n));
        }
        keys.into_iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        let inner = self.inner.lock();
        let mut pairs = Vec::new();
        let mut current = self.first_id(&inner);
        while let Some(id) = current {
            pairs.push((inner.node(id).key.clone(), inner.node(id).value.clone()));
            current = inner.successor(id).filter(|&n| self.node_in_bounds(&inner, n));
        }
        pairs.into_iter()
    }

    /// Explicitly unlinks parent pointers (§4.D "clear") to avoid
    /// long-lived back-references obstructing lifetime tracking.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.nodes.iter_mut() {
            if let Some(node) = slot {
                node.parent = None;
                node.left = None;
                node.right = None;
            }
        }
        inner.nodes.clear();
        inner.free.clear();
        inner.head = None;
        inner.size = 0;
    }

    fn narrowed(&self, lower: Endpoint<K>, upper: Endpoint<K>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lower: tighter(self.lower.clone(), lower, true, &self.inner),
            upper: tighter(self.upper.clone(), upper, false, &self.inner),
        }
    }

    /// `headMap(to)`: half-open `[.., to)`. Composes with this view's own
    /// bounds — never widens them.
    pub fn head_map(&self, to: K, inclusive: bool) -> Self {
        let bound = if inclusive {
            Endpoint::Inclusive(to)
        } else {
            Endpoint::Exclusive(to)
        };
        self.narrowed(Endpoint::Unbounded, bound)
    }

    /// `tailMap(from)`: half-open `[from, ..)`.
    pub fn tail_map(&self, from: K, inclusive: bool) -> Self {
        let bound = if inclusive {
            Endpoint::Inclusive(from)
        } else {
            Endpoint::Exclusive(from)
        };
        self.narrowed(bound, Endpoint::Unbounded)
    }

    /// `subMap(from, fromInclusive, to, toInclusive)`.
    pub fn sub_map(&self, from: K, from_inclusive: bool, to: K, to_inclusive: bool) -> Self {
        let lower = if from_inclusive {
            Endpoint::Inclusive(from)
        } else {
            Endpoint::Exclusive(from)
        };
        let upper = if to_inclusive {
            Endpoint::Inclusive(to)
        } else {
            Endpoint::Exclusive(to)
        };
        self.narrowed(lower, upper)
    }
}

impl<K: Ord + Clone, V: Clone> Default for TreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sub-views compose: tighten bounds, never widen them. `existing` is the
/// caller's current bound on the given side; `proposed` is the new,
/// possibly-narrower request.
fn tighter<K: Ord + Clone>(
    existing: Endpoint<K>,
    proposed: Endpoint<K>,
    is_lower: bool,
    inner: &Arc<Mutex<Inner<K, impl Clone>>>,
) -> Endpoint<K> {
    let inner = inner.lock();
    match (&existing, &proposed) {
        (Endpoint::Unbounded, _) => proposed,
        (_, Endpoint::Unbounded) => existing,
        (e, p) => {
            let (ek, ek_incl) = match e {
                Endpoint::Inclusive(k) => (k, true),
                Endpoint::Exclusive(k) => (k, false),
                Endpoint::Unbounded => unreachable!(),
            };
            let (pk, pk_incl) = match p {
                Endpoint::Inclusive(k) => (k, true),
                Endpoint::Exclusive(k) => (k, false),
                Endpoint::Unbounded => unreachable!(),
            };
            let cmp = inner.compare(pk, ek);
            let pick_proposed = if is_lower {
                cmp == CmpOrdering::Greater || (cmp == CmpOrdering::Equal && !pk_incl && ek_incl)
            } else {
                cmp == CmpOrdering::Less || (cmp == CmpOrdering::Equal && !pk_incl && ek_incl)
            };
            if pick_proposed {
                proposed
            } else {
                existing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// AVL balance invariant (§4.D "AVL node"): every node's stored balance
    /// factor must equal the actual height difference between its right and
    /// left subtrees, recomputed independently of the incremental rotation
    /// bookkeeping, after any sequence of inserts and removes.
    #[quickcheck]
    fn avl_balance_survives_random_insert_remove(ops: Vec<(bool, i16)>) -> bool {
        let map: TreeMap<i16, i16> = TreeMap::new();
        for (insert, key) in ops {
            if insert {
                let _ = map.put(key, key);
            } else {
                map.remove(&key);
            }
            let inner = map.inner.lock();
            if !inner.is_balanced(inner.head) {
                return false;
            }
        }
        true
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let map: TreeMap<i32, &str> = TreeMap::new();
        assert_eq!(map.put(1, "one").unwrap(), None);
        assert_eq!(map.get(&1), Some("one"));
        assert_eq!(map.put(1, "uno").unwrap(), Some("one"));
        assert_eq!(map.remove(&1), Some("uno"));
        assert!(!map.contains_key(&1));
    }

    #[test]
    fn ordered_iteration() {
        let map: TreeMap<i32, i32> = TreeMap::new();
        for k in [5, 3, 8, 1, 4, 7, 9] {
            map.put(k, k * 10).unwrap();
        }
        let keys: Vec<i32> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 3, 4, 5, 7, 8, 9]);
    }

    #[test]
    fn avl_balance_stays_bounded_after_many_inserts() {
        let map: TreeMap<i32, i32> = TreeMap::new();
        for k in 0..200 {
            map.put(k, k).unwrap();
        }
        for k in (0..200).step_by(2) {
            map.remove(&k);
        }
        assert_eq!(map.len(), 100);
        let keys: Vec<i32> = map.iter().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    // Scenario S2: AVL sub-map insert/remove.
    #[test]
    fn s2_submap_tracks_parent() {
        let map: TreeMap<i32, i32> = TreeMap::new();
        for k in [1, 2, 3, 14, 15, 16] {
            map.put(k, k).unwrap();
        }
        let view = map.sub_map(2, true, 15, false);
        assert_eq!(view.len(), 3);
        assert_eq!(view.first_key().unwrap(), 3);
        assert_eq!(view.last_key().unwrap(), 14);

        map.remove(&2);
        assert_eq!(map.len(), 5);
        assert_eq!(view.len(), 3);

        map.remove(&15);
        assert_eq!(map.len(), 4);
        assert_eq!(view.len(), 2);

        view.put(5, 5).unwrap();
        assert_eq!(map.len(), 5);

        assert!(view.put(20, 20).is_err());
    }
}
