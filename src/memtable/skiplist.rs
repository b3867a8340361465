use rand::Rng;

use crate::types::{Entry, InternalKey};

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// A single node in the skip list.
///
/// Each node has `height` forward pointers. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
struct SkipNode {
    key: InternalKey,
    entry: Entry,
    forward: Vec<Option<usize>>, // indices into SkipList.nodes
}

/// A probabilistic sorted map from internal keys to entries.
///
/// Nodes live in an arena and are never removed, so a node index stays
/// valid for the life of the list.
///
/// Average case: O(log n) insert, O(log n) lookup, O(n) iteration.
pub struct SkipList {
    head: [Option<usize>; MAX_HEIGHT],
    nodes: Vec<SkipNode>,
    height: usize,
    size_bytes: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    /// Create a new empty skip list.
    pub fn new() -> Self {
        SkipList {
            head: [None; MAX_HEIGHT],
            nodes: Vec::new(),
            height: 1,
            size_bytes: 0,
        }
    }

    /// Insert an entry. Overwrites if the internal key already exists.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Generate a random height for the new node (coin flip per level)
    ///   3. Splice into the list at each level up to the node's height
    pub fn insert(&mut self, key: InternalKey, entry: Entry) {
        let mut prev = [None; MAX_HEIGHT];
        let found = self.find_greater_or_equal(&key, Some(&mut prev));
        if let Some(idx) = found {
            if self.nodes[idx].key == key {
                let node = &mut self.nodes[idx];
                self.size_bytes = self.size_bytes - node.entry.value.len() + entry.value.len();
                node.entry = entry;
                return;
            }
        }

        let height = self.random_height();
        if height > self.height {
            // prev[level] is already None (head) for the new levels
            self.height = height;
        }

        let idx = self.nodes.len();
        let mut forward = Vec::with_capacity(height);
        for (level, p) in prev.iter().enumerate().take(height) {
            forward.push(self.next_of(*p, level));
        }
        self.size_bytes += Self::entry_size(&key, &entry);
        self.nodes.push(SkipNode { key, entry, forward });
        for (level, p) in prev.iter().enumerate().take(height) {
            self.set_next(*p, level, Some(idx));
        }
    }

    /// Look up an exact internal key.
    pub fn get(&self, key: &InternalKey) -> Option<&Entry> {
        self.find_greater_or_equal(key, None)
            .map(|idx| &self.nodes[idx])
            .filter(|node| node.key == *key)
            .map(|node| &node.entry)
    }

    /// Number of entries in the skip list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the skip list is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Approximate memory usage in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Create an iterator over all entries in sorted order.
    /// Traverses level 0 (the bottom level contains all entries).
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator { list: self, current: self.head[0] }
    }

    /// Index of the first node with key >= target.
    pub(crate) fn seek(&self, target: &InternalKey) -> Option<usize> {
        self.find_greater_or_equal(target, None)
    }

    /// Index of the last node with key < target.
    pub(crate) fn seek_before(&self, target: &InternalKey) -> Option<usize> {
        let mut x = None;
        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(x, level) {
                if self.nodes[next].key < *target {
                    x = Some(next);
                } else {
                    break;
                }
            }
        }
        x
    }

    /// Index of the last node.
    pub(crate) fn last(&self) -> Option<usize> {
        let mut x = None;
        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(x, level) {
                x = Some(next);
            }
        }
        x
    }

    pub(crate) fn next_index(&self, idx: usize) -> Option<usize> {
        self.nodes[idx].forward[0]
    }

    pub(crate) fn node(&self, idx: usize) -> (&InternalKey, &Entry) {
        let node = &self.nodes[idx];
        (&node.key, &node.entry)
    }

    /// Algorithm:
    ///   1. Start at head, highest level
    ///   2. Move forward while next key < target
    ///   3. Drop down one level, recording the predecessor
    ///   4. The level-0 successor of the final predecessor is the answer
    fn find_greater_or_equal(
        &self,
        target: &InternalKey,
        mut prev: Option<&mut [Option<usize>; MAX_HEIGHT]>,
    ) -> Option<usize> {
        let mut x = None;
        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(x, level) {
                if self.nodes[next].key < *target {
                    x = Some(next);
                } else {
                    break;
                }
            }
            if let Some(p) = prev.as_deref_mut() {
                p[level] = x;
            }
        }
        self.next_of(x, 0)
    }

    /// Forward pointer of `node` (None = head) at `level`.
    fn next_of(&self, node: Option<usize>, level: usize) -> Option<usize> {
        match node {
            None => self.head[level],
            Some(idx) => self.nodes[idx].forward[level],
        }
    }

    fn set_next(&mut self, node: Option<usize>, level: usize, next: Option<usize>) {
        match node {
            None => self.head[level] = next,
            Some(idx) => self.nodes[idx].forward[level] = next,
        }
    }

    fn entry_size(key: &InternalKey, entry: &Entry) -> usize {
        key.user_key.len() + 8 + 1 + entry.value.len()
    }

    /// Generate a random level for a new node.
    /// Each level has a 1/4 probability (LevelDB uses 1/4, not 1/2).
    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_ratio(1, 4) {
            height += 1;
        }
        height
    }
}

/// Iterator over skip list entries in sorted order.
///
/// Simply follows level 0 forward pointers: level 0 is a sorted linked list
/// containing every entry.
pub struct SkipListIterator<'a> {
    list: &'a SkipList,
    current: Option<usize>,
}

impl<'a> Iterator for SkipListIterator<'a> {
    type Item = (&'a InternalKey, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = &self.list.nodes[idx];
        self.current = node.forward[0];
        Some((&node.key, &node.entry))
    }
}
