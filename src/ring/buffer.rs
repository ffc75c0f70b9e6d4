use super::{ClipDescriptor, RingError};

/// Fixed-capacity circular list of clips.
///
/// Slots live in preallocated arrays and link to each other by index, so
/// the cycle carries no ownership. `tail` is always the slot right before
/// `head`; rotating moves both by one step and never touches the links.
#[derive(Debug)]
pub struct RingBuffer<T> {
    values: Vec<Option<T>>,
    next: Vec<usize>,
    prev: Vec<usize>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl<T: ClipDescriptor> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: (0..capacity).map(|_| None).collect(),
            next: vec![0; capacity],
            prev: vec![0; capacity],
            free: (0..capacity).rev().collect(),
            head: None,
            tail: None,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Links `value` in as the new tail, between the current tail and head.
    pub fn append(&mut self, value: T) -> Result<(), RingError> {
        if self.is_full() {
            return Err(RingError::CapacityExceeded(self.capacity()));
        }
        let slot = self
            .free
            .pop()
            .ok_or(RingError::CapacityExceeded(self.capacity()))?;

        match (self.head, self.tail) {
            (Some(head), Some(tail)) => {
                self.next[slot] = head;
                self.prev[slot] = tail;
                self.next[tail] = slot;
                self.prev[head] = slot;
                self.tail = Some(slot);
            }
            _ => {
                self.next[slot] = slot;
                self.prev[slot] = slot;
                self.head = Some(slot);
                self.tail = Some(slot);
            }
        }

        self.values[slot] = Some(value);
        self.count += 1;
        Ok(())
    }

    // Nothing evicts from the front of the carousel yet.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn pop_head(&mut self) -> Result<T, RingError> {
        let head = self.head.ok_or(RingError::EmptyRing)?;
        let tail = self.tail.ok_or(RingError::EmptyRing)?;
        let value = self.values[head].take().ok_or(RingError::EmptyRing)?;

        if self.count == 1 {
            self.head = None;
            self.tail = None;
        } else {
            let successor = self.next[head];
            self.next[tail] = successor;
            self.prev[successor] = tail;
            self.head = Some(successor);
        }

        self.free.push(head);
        self.count -= 1;
        Ok(value)
    }

    pub fn pop_tail(&mut self) -> Result<T, RingError> {
        let head = self.head.ok_or(RingError::EmptyRing)?;
        let tail = self.tail.ok_or(RingError::EmptyRing)?;
        let value = self.values[tail].take().ok_or(RingError::EmptyRing)?;

        if self.count == 1 {
            self.head = None;
            self.tail = None;
        } else {
            let predecessor = self.prev[tail];
            self.next[predecessor] = head;
            self.prev[head] = predecessor;
            self.tail = Some(predecessor);
        }

        self.free.push(tail);
        self.count -= 1;
        Ok(value)
    }

    /// Advances head by one; the old head becomes the tail.
    pub fn rotate(&mut self) -> Result<(), RingError> {
        let head = self.head.ok_or(RingError::EmptyRing)?;
        self.tail = Some(head);
        self.head = Some(self.next[head]);
        Ok(())
    }

    pub fn head(&self) -> Option<&T> {
        self.head.and_then(|h| self.values[h].as_ref())
    }

    pub fn head_mut(&mut self) -> Option<&mut T> {
        match self.head {
            Some(h) => self.values[h].as_mut(),
            None => None,
        }
    }

    /// Clips in head-to-tail order.
    pub fn display(&self) -> Result<Vec<&T>, RingError> {
        if self.is_empty() {
            return Err(RingError::EmptyRing);
        }
        Ok(self.iter().collect())
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            cursor: self.head,
            remaining: self.count,
        }
    }
}

pub struct Iter<'a, T> {
    ring: &'a RingBuffer<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.cursor?;
        self.remaining -= 1;
        self.cursor = Some(self.ring.next[slot]);
        self.ring.values[slot].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
