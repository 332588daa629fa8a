use std::collections::HashMap;

use log::trace;

use crate::common::config::FrameId;

/// Per-frame access bookkeeping.
#[derive(Default)]
struct LruKNode {
    /// Access timestamps in recording order. Cleared when the frame is
    /// evicted or removed.
    history: Vec<u64>,
    is_evictable: bool,
}

/// Eviction policy based on backward k-distance: the time elapsed since a
/// frame's k-th most recent access.
///
/// Frames with fewer than k recorded accesses have infinite k-distance and
/// are always preferred as victims; among them the one with the earliest
/// first access wins (plain LRU over the under-sampled frames). Among frames
/// with full histories, the largest k-distance wins.
///
/// Timestamps come from a logical counter, so the access order is a strict
/// total order regardless of how quickly accesses arrive. Callers serialize
/// access through a mutex; operations take `&mut self`.
pub struct LruKReplacer {
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    curr_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "LRU-K requires k >= 1");
        Self {
            node_store: HashMap::new(),
            current_timestamp: 0,
            curr_size: 0,
            replacer_size: num_frames,
            k,
        }
    }

    /// Selects and clears the evictable frame with the largest backward
    /// k-distance. Returns `None` when nothing is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        let mut infinite_victim: Option<(u64, FrameId)> = None;
        let mut finite_victim: Option<(u64, FrameId)> = None;

        for (&frame_id, node) in &self.node_store {
            if !node.is_evictable {
                continue;
            }

            if node.history.len() < self.k {
                // Infinite k-distance: order by first access, oldest first.
                // A frame with no recorded access at all sorts before any
                // recorded one; ties break toward the smaller frame id.
                let first_access = node.history.first().copied().unwrap_or(0);
                let candidate = (first_access, frame_id);
                if infinite_victim.map_or(true, |current| candidate < current) {
                    infinite_victim = Some(candidate);
                }
            } else {
                // The largest k-distance is the earliest k-th recent access.
                let kth_recent = node.history[node.history.len() - self.k];
                let candidate = (kth_recent, frame_id);
                if finite_victim.map_or(true, |current| candidate < current) {
                    finite_victim = Some(candidate);
                }
            }
        }

        let (_, victim) = infinite_victim.or(finite_victim)?;
        let node = self
            .node_store
            .get_mut(&victim)
            .expect("victim chosen from the node store");
        node.history.clear();
        node.is_evictable = false;
        self.curr_size -= 1;
        trace!("Evicted frame {}", victim);
        Some(victim)
    }

    /// Appends the current timestamp to the frame's access history.
    ///
    /// # Panics
    ///
    /// Panics when `frame_id` is outside `[0, num_frames)`.
    pub fn record_access(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "invalid frame id {} (replacer holds {} frames)",
            frame_id,
            self.replacer_size
        );

        self.current_timestamp += 1;
        let timestamp = self.current_timestamp;
        self.node_store
            .entry(frame_id)
            .or_default()
            .history
            .push(timestamp);
    }

    /// Sets whether the frame may be chosen as a victim, maintaining the
    /// evictable count. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics when `frame_id` is outside `[0, num_frames)`.
    pub fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) {
        assert!(
            frame_id < self.replacer_size,
            "invalid frame id {} (replacer holds {} frames)",
            frame_id,
            self.replacer_size
        );

        let node = self.node_store.entry(frame_id).or_default();
        if node.is_evictable != set_evictable {
            node.is_evictable = set_evictable;
            if set_evictable {
                self.curr_size += 1;
            } else {
                self.curr_size -= 1;
            }
        }
    }

    /// Clears a frame's history and stops tracking it as evictable, e.g.
    /// when its page is deleted. Unknown frames are ignored.
    ///
    /// # Panics
    ///
    /// Panics when the frame is tracked but not evictable.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "remove called on non-evictable frame {}",
            frame_id
        );
        node.history.clear();
        node.is_evictable = false;
        self.curr_size -= 1;
    }

    /// Number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }
}
