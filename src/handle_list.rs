//! Doubly linked list with O(1) append and O(1) removal by handle.
//!
//! Nodes live in a [`SlotMap`] and link to each other through their keys.
//! Keys are versioned, so a handle to a removed entry never reaches the entry
//! that later reuses its slot.
use slotmap::SlotMap;
use std::fmt;

slotmap::new_key_type! {
    /// Handle to an entry of a [`HandleList`]
    pub struct Handle;
}

struct Node<E> {
    element: E,
    prev: Option<Handle>,
    next: Option<Handle>,
}

pub struct HandleList<E> {
    nodes: SlotMap<Handle, Node<E>>,
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl<E> HandleList<E> {
    pub fn new() -> Self {
        HandleList {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `element` and returns its handle
    pub fn add(&mut self, element: E) -> Handle {
        let prev = self.tail;
        let handle = self.nodes.insert(Node {
            element,
            prev,
            next: None,
        });
        match prev.and_then(|prev| self.nodes.get_mut(prev)) {
            Some(node) => node.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&E> {
        self.nodes.get(handle).map(|node| &node.element)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut E> {
        self.nodes.get_mut(handle).map(|node| &mut node.element)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.nodes.contains_key(handle)
    }

    /// Unlinks the entry of `handle` and returns its element.
    ///
    /// Returns `None` if the entry was already removed.
    pub fn remove(&mut self, handle: Handle) -> Option<E> {
        let node = self.nodes.remove(handle)?;

        match node.prev.and_then(|prev| self.nodes.get_mut(prev)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| self.nodes.get_mut(next)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        Some(node.element)
    }

    pub fn first(&self) -> Option<&E> {
        self.head.and_then(|handle| self.get(handle))
    }

    pub fn last(&self) -> Option<&E> {
        self.tail.and_then(|handle| self.get(handle))
    }

    /// Removes all entries, outstanding handles become stale
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterates over the elements in insertion order
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            nodes: &self.nodes,
            next: self.head,
            remaining: self.nodes.len(),
        }
    }
}

impl<E> Default for HandleList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: fmt::Debug> fmt::Debug for HandleList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, E> {
    nodes: &'a SlotMap<Handle, Node<E>>,
    next: Option<Handle>,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        let node = self.nodes.get(self.next?)?;
        self.next = node.next;
        self.remaining -= 1;
        Some(&node.element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, E> IntoIterator for &'a HandleList<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Iter<'a, E> {
        self.iter()
    }
}
