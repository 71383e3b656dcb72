//! Recency List Module
//!
//! Implements the ordered structure behind LRU eviction: a doubly linked
//! list whose nodes live in a slot vector and link to each other by index.
//! Promotion, removal, and eviction are all O(1); ties in recency are broken
//! by insertion order, which is deterministic under the shard's write lock.
//!
//! Front = most recently used, back = least recently used.

// == Node Handle ==
/// Stable handle to a node in a [`RecencyList`].
///
/// Handles are only meaningful for the list that issued them and only while
/// the node is present; the owning shard stores one per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug)]
struct Node {
    key: String,
    prev: Option<usize>,
    next: Option<usize>,
}

// == Recency List ==
/// Doubly linked recency list over vector slots.
///
/// Freed slots are recycled through a free list, so long-running shards do
/// not grow the slot vector beyond their high-water entry count.
#[derive(Debug, Default)]
pub struct RecencyList {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl RecencyList {
    // == Constructor ==
    /// Creates a new empty recency list.
    pub fn new() -> Self {
        Self::default()
    }

    // == Push Front ==
    /// Inserts a key at the most-recently-used position.
    ///
    /// Returns the handle the caller must keep to promote or remove the key
    /// later.
    pub fn push_front(&mut self, key: String) -> NodeId {
        let node = Node {
            key,
            prev: None,
            next: self.head,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(head) = self.head {
            self.node_mut(head).prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
        self.len += 1;

        NodeId(index)
    }

    // == Move To Front ==
    /// Promotes a node to the most-recently-used position.
    pub fn move_to_front(&mut self, id: NodeId) {
        if self.head == Some(id.0) {
            return;
        }
        self.detach(id.0);

        let old_head = self.head;
        {
            let node = self.node_mut(id.0);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(head) = old_head {
            self.node_mut(head).prev = Some(id.0);
        }
        self.head = Some(id.0);
        if self.tail.is_none() {
            self.tail = Some(id.0);
        }
    }

    // == Remove ==
    /// Removes a node, returning its key.
    pub fn remove(&mut self, id: NodeId) -> Option<String> {
        self.slots.get(id.0).and_then(|s| s.as_ref())?;
        self.detach(id.0);
        let node = self.slots[id.0].take();
        self.free.push(id.0);
        self.len -= 1;
        node.map(|n| n.key)
    }

    // == Pop Back ==
    /// Removes and returns the least-recently-used key.
    pub fn pop_back(&mut self) -> Option<String> {
        let tail = self.tail?;
        self.remove(NodeId(tail))
    }

    // == Peek Back ==
    /// Returns the least-recently-used key without removing it.
    pub fn peek_back(&self) -> Option<&str> {
        self.tail
            .and_then(|index| self.slots[index].as_ref())
            .map(|node| node.key.as_str())
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Clear ==
    /// Drops all nodes and recycled slots.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Internal Helpers ==
    /// Unlinks a node from its neighbors without freeing its slot.
    fn detach(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.node_ref(index);
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(index);
        node.prev = None;
        node.next = None;
    }

    fn node_ref(&self, index: usize) -> &Node {
        self.slots[index]
            .as_ref()
            .expect("recency list slot is vacant")
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        self.slots[index]
            .as_mut()
            .expect("recency list slot is vacant")
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_new() {
        let list = RecencyList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.peek_back(), None);
    }

    #[test]
    fn test_push_front_order() {
        let mut list = RecencyList::new();

        list.push_front("a".to_string());
        list.push_front("b".to_string());
        list.push_front("c".to_string());

        assert_eq!(list.len(), 3);
        // "a" was inserted first, so it is least recently used
        assert_eq!(list.peek_back(), Some("a"));
    }

    #[test]
    fn test_move_to_front_changes_eviction_order() {
        let mut list = RecencyList::new();

        let a = list.push_front("a".to_string());
        list.push_front("b".to_string());
        list.push_front("c".to_string());

        // Promote "a"; "b" becomes the eviction candidate
        list.move_to_front(a);

        assert_eq!(list.pop_back(), Some("b".to_string()));
        assert_eq!(list.pop_back(), Some("c".to_string()));
        assert_eq!(list.pop_back(), Some("a".to_string()));
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    fn test_move_to_front_on_head_is_noop() {
        let mut list = RecencyList::new();

        list.push_front("a".to_string());
        let b = list.push_front("b".to_string());

        list.move_to_front(b);

        assert_eq!(list.len(), 2);
        assert_eq!(list.peek_back(), Some("a"));
    }

    #[test]
    fn test_remove_middle_node() {
        let mut list = RecencyList::new();

        list.push_front("a".to_string());
        let b = list.push_front("b".to_string());
        list.push_front("c".to_string());

        assert_eq!(list.remove(b), Some("b".to_string()));
        assert_eq!(list.len(), 2);
        assert_eq!(list.pop_back(), Some("a".to_string()));
        assert_eq!(list.pop_back(), Some("c".to_string()));
    }

    #[test]
    fn test_remove_twice_returns_none() {
        let mut list = RecencyList::new();
        let a = list.push_front("a".to_string());

        assert_eq!(list.remove(a), Some("a".to_string()));
        assert_eq!(list.remove(a), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_pop_back_empty() {
        let mut list = RecencyList::new();
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    fn test_single_node_remove_resets_head_and_tail() {
        let mut list = RecencyList::new();
        let a = list.push_front("a".to_string());

        list.remove(a);

        assert_eq!(list.peek_back(), None);
        let b = list.push_front("b".to_string());
        assert_eq!(list.peek_back(), Some("b"));
        list.move_to_front(b);
        assert_eq!(list.pop_back(), Some("b".to_string()));
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut list = RecencyList::new();

        for round in 0..10 {
            let id = list.push_front(format!("key{}", round));
            list.remove(id);
        }

        // Every insert reused the single freed slot
        assert_eq!(list.slots.len(), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut list = RecencyList::new();
        list.push_front("a".to_string());
        list.push_front("b".to_string());

        list.clear();

        assert!(list.is_empty());
        assert_eq!(list.pop_back(), None);
    }
}
