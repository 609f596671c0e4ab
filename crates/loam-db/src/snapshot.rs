//! Registry of live read snapshots.
//!
//! Readers pin a [`SequenceNumber`] by creating a [`Snapshot`]; compaction asks
//! for the [`oldest`](SnapshotList::oldest) live one to decide which versions
//! must be kept. Snapshots are created in non-decreasing sequence order, so
//! insertion order is also sequence order and the list never needs sorting.
//!
//! The list is doubly linked through indices into a slot vector. Released
//! slots are recycled; each carries a generation so a stale handle can never
//! release a slot's new occupant.
//!
//! Not internally synchronized: callers serialize access (typically under the
//! same lock that guards the sequence counter).

use crate::sequence::SequenceNumber;
use loam_observe::{obs_gauge, Meter, NoopMeter, SnapshotEvt, SnapshotKind, VizEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a snapshot registered in a [`SnapshotList`].
///
/// Not `Clone`: releasing consumes the handle. Dropping a handle without
/// releasing it leaves the snapshot pinned for the registry's lifetime.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a snapshot stays pinned until it is released"]
pub struct Snapshot {
    registry: u64,
    slot: usize,
    generation: u64,
    seqno: SequenceNumber,
}

impl Snapshot {
    pub fn sequence_number(&self) -> SequenceNumber {
        self.seqno
    }
}

#[derive(Debug)]
struct Node {
    seqno: SequenceNumber,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    node: Option<Node>,
}

/// Ordered set of live snapshots, oldest first.
pub struct SnapshotList {
    id: u64,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    meter: Arc<dyn Meter>,
}

impl Default for SnapshotList {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotList {
    pub fn new() -> Self {
        Self::with_meter(Arc::new(NoopMeter))
    }

    pub fn with_meter(meter: Arc<dyn Meter>) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            meter,
        }
    }

    /// Registers a snapshot at `seqno` as the newest entry.
    ///
    /// # Panics
    ///
    /// If `seqno` is older than the newest live snapshot.
    pub fn create(&mut self, seqno: SequenceNumber) -> Snapshot {
        if let Some(newest) = self.newest() {
            assert!(
                newest <= seqno,
                "snapshot at {} created after newer snapshot at {}",
                seqno,
                newest
            );
        }

        let node = Node {
            seqno,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].node = Some(node);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;

        tracing::trace!(seqno = seqno.get(), live = self.len, "snapshot created");
        self.publish(seqno, SnapshotKind::Created { live: self.len });

        Snapshot {
            registry: self.id,
            slot,
            generation: self.slots[slot].generation,
            seqno,
        }
    }

    /// Unregisters `snapshot`.
    ///
    /// # Panics
    ///
    /// If `snapshot` was not created by this registry.
    pub fn release(&mut self, snapshot: Snapshot) {
        let owned = snapshot.registry == self.id
            && self
                .slots
                .get(snapshot.slot)
                .is_some_and(|s| s.generation == snapshot.generation && s.node.is_some());
        assert!(owned, "snapshot handle not owned by this registry");

        let slot = &mut self.slots[snapshot.slot];
        let node = match slot.node.take() {
            Some(node) => node,
            None => unreachable!("ownership checked above"),
        };
        slot.generation += 1;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(snapshot.slot);
        self.len -= 1;

        tracing::trace!(seqno = node.seqno.get(), live = self.len, "snapshot released");
        self.publish(node.seqno, SnapshotKind::Released { live: self.len });
    }

    /// Sequence number of the oldest live snapshot.
    pub fn oldest(&self) -> Option<SequenceNumber> {
        self.head.map(|i| self.node(i).seqno)
    }

    /// Sequence number of the newest live snapshot.
    pub fn newest(&self) -> Option<SequenceNumber> {
        self.tail.map(|i| self.node(i).seqno)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Live sequence numbers, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.node(cursor?);
            cursor = node.next;
            Some(node.seqno)
        })
    }

    fn node(&self, slot: usize) -> &Node {
        match &self.slots[slot].node {
            Some(node) => node,
            None => unreachable!("linked slot {} is vacant", slot),
        }
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node {
        match &mut self.slots[slot].node {
            Some(node) => node,
            None => unreachable!("linked slot {} is vacant", slot),
        }
    }

    fn publish(&self, seqno: SequenceNumber, kind: SnapshotKind) {
        obs_gauge!(self.meter, "snapshots_live", &[], self.len as i64);
        self.meter.emit(VizEvent::Snapshot(SnapshotEvt {
            seqno: seqno.get(),
            kind,
        }));
    }
}

impl std::fmt::Debug for SnapshotList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
