//! Bounded queue of targeted placement requests.

use std::collections::VecDeque;

use crate::config::HazardKind;

/// Ask for a hazard at a specific lane and world Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRequest {
    /// World Z of the hazard.
    pub target_z: f32,
    /// Lane index (clamped to the segment's lanes).
    pub lane: usize,
    /// Obstacle or train.
    pub kind: HazardKind,
}

/// FIFO of pending requests, oldest first.
#[derive(Clone, Debug)]
pub struct RequestQueue {
    items: VecDeque<PlacementRequest>,
    capacity: usize,
}

impl RequestQueue {
    /// Empty queue holding at most `capacity` requests.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a request. Returns the oldest request if it had to be dropped.
    pub fn push(&mut self, request: PlacementRequest) -> Option<PlacementRequest> {
        let dropped = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(request);
        dropped
    }

    /// Drops requests whose target is behind `observer_z`. Returns how many.
    pub fn expire_behind(&mut self, observer_z: f32) -> usize {
        let before = self.items.len();
        self.items.retain(|r| r.target_z >= observer_z);
        before - self.items.len()
    }

    /// Request at `index` (0 = oldest).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PlacementRequest> {
        self.items.get(index).copied()
    }

    /// Removes the request at `index`.
    pub fn remove(&mut self, index: usize) -> Option<PlacementRequest> {
        self.items.remove(index)
    }

    /// Pending requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No pending requests?
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PlacementRequest> {
        self.items.iter()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(z: f32) -> PlacementRequest {
        PlacementRequest {
            target_z: z,
            lane: 0,
            kind: HazardKind::Obstacle,
        }
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let mut queue = RequestQueue::new(2);
        assert!(queue.push(req(1.0)).is_none());
        assert!(queue.push(req(2.0)).is_none());
        assert_eq!(queue.push(req(3.0)), Some(req(1.0)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(0), Some(req(2.0)));
    }

    #[test]
    fn test_expire_behind() {
        let mut queue = RequestQueue::new(8);
        for z in [5.0, 15.0, 25.0] {
            queue.push(req(z));
        }
        assert_eq!(queue.expire_behind(10.0), 1);
        assert_eq!(queue.iter().map(|r| r.target_z).collect::<Vec<_>>(), vec![15.0, 25.0]);
    }
}
