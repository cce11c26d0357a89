//! Bounded FIFO history per telemetry channel.
//!
//! One [`RingBuffer`] per [`ChannelKey`] holds the most recent samples of a
//! single scalar series. Buffers are created lazily on first write, evict
//! oldest-first at capacity, and live only in memory. Readers always get a
//! copy via [`RingBuffer::snapshot`], never a live reference, so the emitter
//! can never observe a half-written series.

use crate::chart::field::FieldKind;
use std::collections::{HashMap, VecDeque};

/// Identity of one scalar time series: axis index plus field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    /// Axis index, bounded by the active joint model.
    pub axis: usize,
    /// Telemetry field.
    pub field: FieldKind,
}

impl ChannelKey {
    /// Shorthand constructor.
    pub fn new(axis: usize, field: FieldKind) -> Self {
        Self { axis, field }
    }
}

/// Fixed-capacity FIFO of samples for one channel.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: VecDeque<f64>,
    capacity: usize,
}

impl RingBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one at capacity. O(1) amortized.
    pub fn push(&mut self, value: f64) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    /// Number of samples currently held. Never exceeds the capacity.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no samples are held.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.buf.iter().copied().collect()
    }

    /// Shrinks or grows the capacity; excess history is dropped oldest-first.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.buf.len() > capacity {
            self.buf.pop_front();
        }
    }
}

/// All per-channel ring buffers for the chart.
#[derive(Debug)]
pub struct RingChannelStore {
    channels: HashMap<ChannelKey, RingBuffer>,
    capacity: usize,
}

impl RingChannelStore {
    /// Creates an empty store; every channel gets `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: HashMap::new(),
            capacity,
        }
    }

    /// Appends to a channel, creating it on first write.
    pub fn append(&mut self, key: ChannelKey, value: f64) {
        self.channels
            .entry(key)
            .or_insert_with(|| RingBuffer::new(self.capacity))
            .push(value);
    }

    /// Pre-creates an empty channel so it shows up in snapshots.
    pub fn register(&mut self, key: ChannelKey) {
        self.channels
            .entry(key)
            .or_insert_with(|| RingBuffer::new(self.capacity));
    }

    /// Copy of one channel's history; empty if the channel does not exist.
    pub fn snapshot(&self, key: ChannelKey) -> Vec<f64> {
        self.channels
            .get(&key)
            .map(RingBuffer::snapshot)
            .unwrap_or_default()
    }

    /// Current length of one channel.
    pub fn len(&self, key: ChannelKey) -> usize {
        self.channels.get(&key).map_or(0, RingBuffer::len)
    }

    /// True when no channels exist at all.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Length of the fullest channel; drives the synthetic x-axis labels.
    pub fn longest(&self) -> usize {
        self.channels.values().map(RingBuffer::len).max().unwrap_or(0)
    }

    /// Drops the named channels, leaving the rest untouched.
    pub fn clear(&mut self, keys: &[ChannelKey]) {
        for key in keys {
            self.channels.remove(key);
        }
    }

    /// Drops every channel.
    pub fn clear_all(&mut self) {
        self.channels.clear();
    }

    /// Applies a new per-channel capacity, truncating existing history
    /// oldest-first.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        for ring in self.channels.values_mut() {
            ring.set_capacity(capacity);
        }
    }

    /// Current per-channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(axis: usize) -> ChannelKey {
        ChannelKey::new(axis, FieldKind::ActualJointPositions)
    }

    #[test]
    fn ring_holds_last_capacity_values_in_order() {
        let mut ring = RingBuffer::new(5);
        for i in 0..12 {
            ring.push(f64::from(i));
        }
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.snapshot(), vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn first_sample_evicted_at_capacity_plus_one() {
        let mut ring = RingBuffer::new(6000);
        for i in 1..=6001 {
            ring.push(f64::from(i));
        }
        assert_eq!(ring.len(), 6000);
        let snap = ring.snapshot();
        assert_eq!(snap[0], 2.0);
        assert_eq!(snap[5999], 6001.0);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut ring = RingBuffer::new(3);
        ring.push(1.0);
        let snap = ring.snapshot();
        ring.push(2.0);
        assert_eq!(snap, vec![1.0]);
        assert_eq!(ring.snapshot(), vec![1.0, 2.0]);
    }

    #[test]
    fn shrinking_capacity_drops_oldest() {
        let mut ring = RingBuffer::new(5);
        for i in 0..5 {
            ring.push(f64::from(i));
        }
        ring.set_capacity(2);
        assert_eq!(ring.snapshot(), vec![3.0, 4.0]);
    }

    #[test]
    fn store_creates_channels_lazily() {
        let mut store = RingChannelStore::new(10);
        assert!(store.is_empty());
        store.append(key(0), 1.5);
        assert_eq!(store.len(key(0)), 1);
        assert_eq!(store.snapshot(key(1)), Vec::<f64>::new());
    }

    #[test]
    fn registered_channel_is_present_but_empty() {
        let mut store = RingChannelStore::new(10);
        store.register(key(2));
        assert!(!store.is_empty());
        assert_eq!(store.len(key(2)), 0);
    }

    #[test]
    fn clearing_some_channels_spares_the_rest() {
        let mut store = RingChannelStore::new(10);
        store.append(key(0), 1.0);
        store.append(key(1), 2.0);
        store.append(key(2), 3.0);
        store.clear(&[key(0), key(2)]);
        assert_eq!(store.len(key(0)), 0);
        assert_eq!(store.snapshot(key(1)), vec![2.0]);
        assert_eq!(store.len(key(2)), 0);
    }

    #[test]
    fn longest_tracks_fullest_channel() {
        let mut store = RingChannelStore::new(10);
        store.append(key(0), 1.0);
        store.append(key(1), 1.0);
        store.append(key(1), 2.0);
        assert_eq!(store.longest(), 2);
        store.clear_all();
        assert_eq!(store.longest(), 0);
    }
}
