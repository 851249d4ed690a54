//! An insertion-ordered hash table using SwissTable-style group probing.
//!
//! The table is an open-addressed index over power-of-two capacities,
//! partitioned into 16-slot groups. A parallel control array holds one byte
//! per slot: `EMPTY` (0x80) for slots that never held an entry since the
//! last rebuild, `DELETED` (0xFE) for tombstones, and a 7-bit fingerprint of
//! the entry's hash for live slots. Because the top bit discriminates
//! occupied from not-occupied, a whole group is classified with one wide
//! load and a handful of mask operations (see the [`group`] module).
//!
//! [`OrderedTable<T>`] stores values of type `T` and provides fast
//! insertion, lookup, and removal while preserving insertion order across
//! every operation, including rebuilds. This is a fairly low-level structure
//! that requires you to provide the hash value and an equality predicate for
//! each operation. Prefer the [`OrderedMap<K, V, S>`] wrapper for a
//! key-value interface unless you are building your own map structure.
//!
//! ## Design
//!
//! An entry's hash `h` is split once: `h >> 7` selects the starting group
//! and `h & 0x7F` is the fingerprint recorded in the control byte. Lookups
//! walk groups by triangular increments (1, 2, 3, …) modulo the group
//! count, which visits every group exactly once on power-of-two counts, so
//! probing always terminates. Within each group, candidate slots are those
//! whose control byte matches the fingerprint; candidates are verified by
//! comparing the cached full hash before the (potentially expensive)
//! equality predicate runs. A group containing an `EMPTY` byte ends the
//! probe: the key cannot be stored beyond the first empty slot it would
//! have claimed.
//!
//! Insertion remembers the first empty-or-deleted slot seen along the probe
//! path and keeps walking until a group with an `EMPTY` byte proves the key
//! absent, then claims the remembered slot. This lets tombstones be reused
//! without ever breaking the probe-termination property.
//!
//! Deletion prefers marking the slot `EMPTY` outright when its group still
//! has another `EMPTY` byte, since no probe can be relying on the slot to
//! continue; otherwise it leaves a tombstone. Tombstones count toward the
//! load bound `used + tombstones <= capacity * 7/8`, and when they exceed
//! an eighth of the capacity the table is rebuilt at the same size to shed
//! them.
//!
//! Insertion order is tracked by threading a doubly linked list through the
//! slots themselves: each slot records the indices of its predecessor and
//! successor, and the table holds head and tail. Append and unlink are
//! O(1). A rebuild replays entries by walking this chain from head to tail
//! rather than scanning the slot array, so the chain in the new table is
//! rebuilt in exactly the old order and iteration is reproducible across
//! any schedule of grows and compactions. Placement during replay uses the
//! hash cached in the slot; key objects whose hash drifts after insertion
//! simply become unreachable rather than corrupting the table.
//!
//! All data lives in one contiguous allocation, `[ control | slots ]`,
//! sized for at least one group (16 slots). There is no zero-capacity
//! state: an empty table owns a 16-slot allocation from birth, which keeps
//! every probe path free of emptiness checks.
//!
//! Two counters drive external consistency checks. `version` increases on
//! every successful mutation, including in-place value replacement.
//! `epoch` increases only when the set of live slots changes (insert of a
//! new entry, removal, clear, rebuild); [`Cursor`] snapshots it to deliver
//! fail-fast iteration while tolerating value replacement mid-walk.
//!
//! ## Safety invariants
//!
//! 1. **Bounds**: group indices are masked by `group_mask`, so
//!    `group * 16 + offset` with `offset < 16` is always within the slot
//!    and control arrays.
//! 2. **Initialization**: a control byte with the top bit clear marks a
//!    slot whose `Slot<T>` is fully initialized; `EMPTY`/`DELETED` slots
//!    hold no live data.
//! 3. **Order chain**: `head`/`tail` and the per-slot links form an acyclic
//!    chain visiting exactly the live slots; a slot is on the chain iff its
//!    control byte is full.
//! 4. **Load bound**: `used + tombstones <= capacity * 7/8`, so at least
//!    one `EMPTY` byte exists and probes terminate.
//!
//! [`group`]: crate::group
//! [`OrderedMap<K, V, S>`]: crate::ordered_map::OrderedMap

use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::convert::Infallible;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::Error;
use crate::group::DELETED;
use crate::group::EMPTY;
use crate::group::GROUP_WIDTH;
use crate::group::Group;
use crate::group::is_full;

/// Smallest slot capacity a table ever has. One full group.
const MIN_CAPACITY: usize = GROUP_WIDTH;

/// Sentinel index terminating the order chain.
const NIL: usize = usize::MAX;

/// Selects the starting probe group from a hash.
#[inline(always)]
fn h1(hash: u64) -> usize {
    (hash >> 7) as usize
}

/// The 7-bit fingerprint stored in control bytes. The top bit is always
/// clear, so a fingerprint never collides with `EMPTY` or `DELETED`.
#[inline(always)]
fn h2(hash: u64) -> u8 {
    (hash & 0x7F) as u8
}

/// Number of entries (live plus tombstones) a table of `capacity` slots may
/// hold before it must grow.
#[inline(always)]
fn usable(capacity: usize) -> usize {
    capacity - capacity / 8
}

/// Smallest power-of-two slot capacity that holds `required` live entries
/// within the 7/8 load bound.
#[inline(always)]
fn capacity_for(required: usize) -> usize {
    let slots = required
        .checked_mul(8)
        .expect("capacity overflow")
        .div_ceil(7);
    slots.next_power_of_two().max(MIN_CAPACITY)
}

/// Prefetches data into the cache.
///
/// # Safety
///
/// The caller must ensure that `ptr` points to a memory location that is
/// safe to read from. While `_mm_prefetch` might not fault on invalid
/// addresses, the behavior is undefined if the address is not valid for
/// reads.
#[inline(always)]
#[cfg(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse"
))]
unsafe fn prefetch<T>(ptr: *const T) {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::{_MM_HINT_T0, _mm_prefetch};
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};

    // SAFETY: Caller guarantees `ptr` is valid for reads.
    unsafe {
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }
}

#[inline(always)]
#[cfg(not(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse"
)))]
unsafe fn prefetch<T>(_ptr: *const T) {}

/// Probe sequence over groups based on triangular numbers, which visits
/// every group exactly once while the group count is a power of two.
///
/// The stride grows by one group per step: first a jump of 1, then 2, then
/// 3, and so on, all taken modulo the group count.
struct ProbeSeq {
    group: usize,
    stride: usize,
}

impl ProbeSeq {
    #[inline(always)]
    fn new(hash: u64, group_mask: usize) -> Self {
        ProbeSeq {
            group: h1(hash) & group_mask,
            stride: 0,
        }
    }

    #[inline(always)]
    fn move_next(&mut self, group_mask: usize) {
        // The load bound guarantees an EMPTY byte ends every probe before
        // the sequence wraps.
        debug_assert!(self.stride <= group_mask, "probe sequence wrapped the table");

        self.stride += 1;
        self.group += self.stride;
        self.group &= group_mask;
    }
}

/// One slot's payload: the entry value, its cached full hash, and the order
/// chain links. Only initialized while the slot's control byte is full.
struct Slot<T> {
    hash: u64,
    prev: usize,
    next: usize,
    value: T,
}

#[derive(Clone, Copy, Debug)]
struct DataLayout {
    layout: Layout,
    slots_offset: usize,
}

impl DataLayout {
    fn new<T>(capacity: usize) -> Self {
        let ctrl_layout = Layout::array::<u8>(capacity).expect("allocation size overflow");
        let slots_layout =
            Layout::array::<MaybeUninit<Slot<T>>>(capacity).expect("allocation size overflow");

        let (layout, slots_offset) = ctrl_layout
            .extend(slots_layout)
            .expect("allocation size overflow");

        DataLayout {
            layout,
            slots_offset,
        }
    }
}

/// Outcome of a combined lookup/insertion probe.
enum Probed {
    /// The key is live at this slot index.
    Found(usize),
    /// The key is absent; this is the first empty-or-deleted slot along its
    /// probe path.
    Miss(usize),
}

/// Debug statistics for table analysis.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries.
    pub used: usize,
    /// Number of tombstoned slots.
    pub tombstones: usize,
    /// Total number of slots allocated.
    pub slots: usize,
    /// Maximum load (live plus tombstones) before a grow triggers.
    pub capacity: usize,
    /// (used + tombstones) / slots.
    pub load_factor: f64,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Ordered Table Debug Statistics ===");
        println!(
            "Population: {}/{} live, {} tombstones ({:.2}% load factor)",
            self.used,
            self.capacity,
            self.tombstones,
            self.load_factor * 100.0
        );
        println!("Slots: {}", self.slots);
    }
}

/// Histogram of probe lengths, measured in groups examined per live entry.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct ProbeHistogram {
    /// `by_groups[n]` counts entries found after examining `n + 1` groups.
    /// The final bucket also absorbs anything longer.
    pub by_groups: [usize; GROUP_WIDTH],
}

#[cfg(feature = "stats")]
impl ProbeHistogram {
    /// Pretty-print the probe histogram.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("probe length (groups examined):");
        for (i, &count) in self.by_groups.iter().enumerate() {
            if count != 0 {
                println!("{:>3} | {}", i + 1, count);
            }
        }
    }
}

/// An insertion-ordered hash table using SwissTable-style group probing.
///
/// `OrderedTable<T>` stores values of type `T` and provides fast insertion,
/// lookup, and removal. Unlike standard hash maps, this implementation
/// requires you to provide the hash value and an equality predicate for
/// each operation. Iteration yields entries in insertion order, and that
/// order survives growth and tombstone compaction.
///
/// ## Performance Characteristics
///
/// - **Memory**: 1 control byte per slot, plus the size of `T`, the cached
///   hash, and two order-link words per slot.
pub struct OrderedTable<T> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    group_mask: usize,
    used: usize,
    tombstones: usize,

    head: usize,
    tail: usize,

    version: u64,
    epoch: u64,

    _phantom: PhantomData<T>,
}

impl<T> Debug for OrderedTable<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderedTable")
            .field("used", &self.used)
            .field("tombstones", &self.tombstones)
            .field("slots", &self.slot_count())
            .field("version", &self.version)
            .finish()
    }
}

impl<T> Default for OrderedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OrderedTable<T> {
    fn drop(&mut self) {
        // SAFETY: Control bytes precisely track which slots hold
        // initialized values (invariant 2), and the allocation matches
        // `self.layout`.
        unsafe {
            if core::mem::needs_drop::<T>() && self.used > 0 {
                for index in 0..self.slot_count() {
                    if is_full(self.ctrl(index)) {
                        self.slots_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
        }
    }
}

impl<T> Clone for OrderedTable<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        let new_table = Self {
            layout: self.layout,
            alloc: alloc_arrays(self.layout, self.slot_count())
                .unwrap_or_else(|_| handle_alloc_error(self.layout.layout)),
            group_mask: self.group_mask,
            used: self.used,
            tombstones: self.tombstones,
            head: self.head,
            tail: self.tail,
            version: self.version,
            epoch: self.epoch,
            _phantom: PhantomData,
        };

        // SAFETY: Source and destination share capacity and layout. Copying
        // the control array first means a full byte in the destination is
        // matched below by writing the cloned slot at the same index, so
        // invariant 2 is restored before the table is returned. Links are
        // index-based and remain valid verbatim.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.ctrl_ptr().as_ref().as_ptr(),
                new_table.ctrl_ptr().as_mut().as_mut_ptr(),
                self.slot_count(),
            );

            for index in 0..self.slot_count() {
                if is_full(self.ctrl(index)) {
                    let src = self.slot_ref(index);
                    new_table
                        .slots_ptr()
                        .as_mut()
                        .get_unchecked_mut(index)
                        .write(Slot {
                            hash: src.hash,
                            prev: src.prev,
                            next: src.next,
                            value: src.value.clone(),
                        });
                }
            }
        }

        new_table
    }
}

/// Allocates the `[ control | slots ]` block and fills the control array
/// with `EMPTY`.
fn alloc_arrays(layout: DataLayout, capacity: usize) -> Result<NonNull<u8>, Error> {
    debug_assert!(capacity >= MIN_CAPACITY);

    // SAFETY: The layout covers at least one group of control bytes, so its
    // size is non-zero; a null return is mapped to an error instead of UB.
    unsafe {
        let raw = alloc::alloc::alloc(layout.layout);
        let Some(raw) = NonNull::new(raw) else {
            return Err(Error::OutOfMemory);
        };
        core::ptr::write_bytes(raw.as_ptr(), EMPTY, capacity);
        Ok(raw)
    }
}

/// Adapts an infallible predicate to the fallible probing core.
#[inline(always)]
fn always<T>(mut eq: impl FnMut(&T) -> bool) -> impl FnMut(&T) -> Result<bool, Infallible> {
    move |value| Ok(eq(value))
}

/// Discharges an `Infallible` error branch.
#[inline(always)]
fn unreach<V>(result: Result<V, Infallible>) -> V {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

impl<T> OrderedTable<T> {
    /// Creates an empty table with the minimum capacity of 16 slots.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a table that holds at least `capacity` entries without
    /// growing.
    ///
    /// The slot count may be larger than requested due to the power-of-two,
    /// group-based organization.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity(capacity)
            .unwrap_or_else(|_| handle_alloc_error(DataLayout::new::<T>(capacity_for(capacity)).layout))
    }

    /// Fallible form of [`with_capacity`]; returns [`Error::OutOfMemory`]
    /// instead of aborting when the allocator fails.
    ///
    /// [`with_capacity`]: OrderedTable::with_capacity
    pub fn try_with_capacity(capacity: usize) -> Result<Self, Error> {
        let slots = if capacity == 0 {
            MIN_CAPACITY
        } else {
            capacity_for(capacity)
        };

        let layout = DataLayout::new::<T>(slots);
        let alloc = alloc_arrays(layout, slots)?;

        Ok(Self {
            layout,
            alloc,
            group_mask: slots / GROUP_WIDTH - 1,
            used: 0,
            tombstones: 0,
            head: NIL,
            tail: NIL,
            version: 0,
            epoch: 0,
            _phantom: PhantomData,
        })
    }

    /// Returns `true` if the table contains no live entries.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Returns the number of live entries in the table.
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns the number of entries the table can hold before growing.
    pub fn capacity(&self) -> usize {
        usable(self.slot_count())
    }

    /// Returns the mutation counter. It increases on every successful
    /// mutation, including in-place value replacement, and never decreases.
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline(always)]
    fn slot_count(&self) -> usize {
        (self.group_mask + 1) * GROUP_WIDTH
    }

    fn ctrl_ptr(&self) -> NonNull<[u8]> {
        // `self.alloc` points to a live allocation described by
        // `self.layout`; the control array spans `slot_count` bytes from
        // offset zero.
        NonNull::slice_from_raw_parts(self.alloc, self.slot_count())
    }

    fn slots_ptr(&self) -> NonNull<[MaybeUninit<Slot<T>>]> {
        // SAFETY: `self.alloc` points to a live allocation described by
        // `self.layout`; the slot array begins at `slots_offset` and spans
        // `slot_count` elements.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.slots_offset).cast(),
                self.slot_count(),
            )
        }
    }

    /// Reads the control byte at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `slot_count`.
    #[inline(always)]
    unsafe fn ctrl(&self, index: usize) -> u8 {
        // SAFETY: Caller ensures `index` is within the control array.
        unsafe { *self.ctrl_ptr().as_ref().get_unchecked(index) }
    }

    /// Writes the control byte at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `slot_count`.
    #[inline(always)]
    unsafe fn set_ctrl(&mut self, index: usize, byte: u8) {
        // SAFETY: Caller ensures `index` is within the control array.
        unsafe {
            *self.ctrl_ptr().as_mut().get_unchecked_mut(index) = byte;
        }
    }

    /// Loads the 16-byte control group at group index `group`.
    ///
    /// # Safety
    ///
    /// `group` must be at most `group_mask`.
    #[inline(always)]
    unsafe fn group_at(&self, group: usize) -> Group {
        // SAFETY: `group <= group_mask`, so the 16 bytes starting at
        // `group * 16` lie within the control array.
        unsafe {
            Group::load(
                self.ctrl_ptr()
                    .as_ref()
                    .as_ptr()
                    .add(group * GROUP_WIDTH),
            )
        }
    }

    /// Returns a shared reference to the slot at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `slot_count` and its control byte must be
    /// full.
    #[inline(always)]
    unsafe fn slot_ref(&self, index: usize) -> &Slot<T> {
        // SAFETY: Caller ensures the slot is in bounds and initialized
        // (invariant 2).
        unsafe { self.slots_ptr().as_ref().get_unchecked(index).assume_init_ref() }
    }

    /// Returns a mutable reference to the slot at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `slot_count` and its control byte must be
    /// full.
    #[inline(always)]
    unsafe fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        // SAFETY: Caller ensures the slot is in bounds and initialized
        // (invariant 2).
        unsafe {
            self.slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .assume_init_mut()
        }
    }

    /// Walks the probe sequence for `hash`, verifying fingerprint matches
    /// by cached hash and then `eq`. Returns the live slot on a hit, or the
    /// remembered first empty-or-deleted slot on a miss.
    ///
    /// A failing predicate aborts the walk with no table mutation.
    #[inline]
    fn probe<E>(
        &self,
        hash: u64,
        eq: &mut impl FnMut(&T) -> Result<bool, E>,
    ) -> Result<Probed, E> {
        let tag = h2(hash);
        let mut seq = ProbeSeq::new(hash, self.group_mask);
        let mut insert_slot = None;

        loop {
            // SAFETY: `seq.group` is masked by `group_mask`.
            let group = unsafe { self.group_at(seq.group) };
            let base = seq.group * GROUP_WIDTH;

            let mut candidates = group.match_tag(tag);
            while let Some(bit) = candidates.lowest_set_bit() {
                candidates.0 &= candidates.0 - 1;
                let index = base + bit;

                // SAFETY: A fingerprint match means the control byte is
                // full, so the slot is initialized; the next candidate (if
                // any) is prefetched while this one is verified.
                unsafe {
                    if let Some(next_bit) = candidates.lowest_set_bit() {
                        prefetch(self.slots_ptr().as_ref().as_ptr().add(base + next_bit));
                    }
                    let slot = self.slot_ref(index);
                    if slot.hash == hash && eq(&slot.value)? {
                        return Ok(Probed::Found(index));
                    }
                }
            }

            if insert_slot.is_none() {
                insert_slot = group
                    .match_empty_or_deleted()
                    .lowest_set_bit()
                    .map(|bit| base + bit);
            }

            if group.match_empty().any_set() {
                // The terminating group always contributes an
                // empty-or-deleted slot, so `insert_slot` is set by now.
                let Some(slot) = insert_slot else {
                    unreachable!("probe ended in a group with no available slot");
                };
                return Ok(Probed::Miss(slot));
            }

            seq.move_next(self.group_mask);
        }
    }

    /// Finds the first `EMPTY` slot along the probe path for `hash`.
    /// Used after a rebuild, when the table holds no tombstones.
    #[inline]
    fn find_insert_slot(&self, hash: u64) -> usize {
        let mut seq = ProbeSeq::new(hash, self.group_mask);
        loop {
            // SAFETY: `seq.group` is masked by `group_mask`.
            let group = unsafe { self.group_at(seq.group) };
            if let Some(bit) = group.match_empty_or_deleted().lowest_set_bit() {
                return seq.group * GROUP_WIDTH + bit;
            }
            seq.move_next(self.group_mask);
        }
    }

    /// Finds a value in the table by hash and equality predicate.
    ///
    /// Returns a reference to the value if found, or `None` if no matching
    /// value exists. This method does not modify the table and can be
    /// called on shared references.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value to search for
    /// * `eq` - A predicate function that returns `true` for the desired
    ///   value
    #[inline]
    pub fn find(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&T> {
        if self.used == 0 {
            return None;
        }

        match unreach(self.probe(hash, &mut always(eq))) {
            // SAFETY: `probe` only reports live, in-bounds slots.
            Probed::Found(index) => Some(unsafe { &self.slot_ref(index).value }),
            Probed::Miss(_) => None,
        }
    }

    /// Finds a value and returns a mutable reference to it.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        if self.used == 0 {
            return None;
        }

        match unreach(self.probe(hash, &mut always(eq))) {
            // SAFETY: `probe` only reports live, in-bounds slots.
            Probed::Found(index) => Some(unsafe { &mut self.slot_mut(index).value }),
            Probed::Miss(_) => None,
        }
    }

    /// Finds a value with a predicate that may fail.
    ///
    /// A failing predicate aborts the lookup and surfaces its error with
    /// the table unchanged; a predicate returning `Ok(false)` simply moves
    /// the probe along.
    pub fn try_find_with(
        &self,
        hash: u64,
        mut eq: impl FnMut(&T) -> Result<bool, Error>,
    ) -> Result<Option<&T>, Error> {
        if self.used == 0 {
            return Ok(None);
        }

        match self.probe(hash, &mut eq)? {
            // SAFETY: `probe` only reports live, in-bounds slots.
            Probed::Found(index) => Ok(Some(unsafe { &self.slot_ref(index).value })),
            Probed::Miss(_) => Ok(None),
        }
    }

    /// Removes a value with a predicate that may fail.
    ///
    /// A failing predicate aborts the removal with no mutation.
    pub fn try_remove_with(
        &mut self,
        hash: u64,
        mut eq: impl FnMut(&T) -> Result<bool, Error>,
    ) -> Result<Option<T>, Error> {
        if self.used == 0 {
            return Ok(None);
        }

        match self.probe(hash, &mut eq)? {
            // SAFETY: `probe` only reports live, in-bounds slots.
            Probed::Found(index) => Ok(Some(unsafe { self.remove_at(index) })),
            Probed::Miss(_) => Ok(None),
        }
    }

    /// Removes and returns a value from the table.
    ///
    /// The value is identified by its hash and an equality predicate. If
    /// the value is found it is removed, its order record is unlinked, and
    /// it is returned. Otherwise `None` is returned.
    pub fn remove(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<T> {
        if self.used == 0 {
            return None;
        }

        match unreach(self.probe(hash, &mut always(eq))) {
            // SAFETY: `probe` only reports live, in-bounds slots.
            Probed::Found(index) => Some(unsafe { self.remove_at(index) }),
            Probed::Miss(_) => None,
        }
    }

    /// Removes the live entry at `index` and returns its value.
    ///
    /// # Safety
    ///
    /// `index` must be a live slot of this table.
    unsafe fn remove_at(&mut self, index: usize) -> T {
        // SAFETY: The caller guarantees `index` is live, so the slot is
        // initialized and on the order chain. Reading the whole slot out
        // transfers ownership of the value to this frame; the control byte
        // is rewritten below before anything can observe the slot again.
        let slot = unsafe {
            self.slots_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read()
        };

        // SAFETY: Chain neighbors of a live slot are live (invariant 3).
        unsafe {
            if slot.prev == NIL {
                self.head = slot.next;
            } else {
                self.slot_mut(slot.prev).next = slot.next;
            }
            if slot.next == NIL {
                self.tail = slot.prev;
            } else {
                self.slot_mut(slot.next).prev = slot.prev;
            }
        }

        // A slot in a group that still has an EMPTY byte cannot be load
        // bearing for any probe, so it can skip the tombstone.
        //
        // SAFETY: `index / GROUP_WIDTH <= group_mask` and `index` is in
        // bounds.
        unsafe {
            let group = self.group_at(index / GROUP_WIDTH);
            if group.match_empty().any_set() {
                self.set_ctrl(index, EMPTY);
            } else {
                self.set_ctrl(index, DELETED);
                self.tombstones += 1;
            }
        }

        self.used -= 1;
        self.version += 1;
        self.epoch += 1;

        if self.tombstones > self.slot_count() / 8 {
            // Compaction is opportunistic: on allocator failure the table
            // keeps its tombstones and stays fully correct.
            let _ = self.try_rebuild(self.slot_count());
        }

        slot.value
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// Returns an [`Entry`] that allows insertion or modification of the
    /// value. If a grow is needed to admit a new entry and allocation
    /// fails, this aborts via `handle_alloc_error`; use [`try_entry`] to
    /// surface the failure instead.
    ///
    /// [`try_entry`]: OrderedTable::try_entry
    pub fn entry(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Entry<'_, T> {
        let layout = self.layout.layout;
        self.try_entry(hash, eq)
            .unwrap_or_else(|_| handle_alloc_error(layout))
    }

    /// Gets an entry for the given hash and equality predicate, surfacing
    /// allocation failure.
    ///
    /// On [`Error::OutOfMemory`] the table is unchanged, at its previous
    /// capacity with its previous contents.
    pub fn try_entry(
        &mut self,
        hash: u64,
        eq: impl FnMut(&T) -> bool,
    ) -> Result<Entry<'_, T>, Error> {
        match unreach(self.probe(hash, &mut always(eq))) {
            Probed::Found(index) => Ok(Entry::Occupied(OccupiedEntry { table: self, index })),
            Probed::Miss(mut index) => {
                // Claiming a tombstone does not change the load, so only an
                // EMPTY target needs the grow check.
                //
                // SAFETY: `probe` reports in-bounds slots.
                let reusing = unsafe { self.ctrl(index) == DELETED };
                if !reusing && self.used + self.tombstones + 1 > usable(self.slot_count()) {
                    self.try_rebuild(self.grown_capacity())?;
                    index = self.find_insert_slot(hash);
                }

                Ok(Entry::Vacant(VacantEntry {
                    table: self,
                    hash,
                    index,
                }))
            }
        }
    }

    /// Slot capacity after the next grow: at least double, and large enough
    /// to keep the live entries under the 7/8 bound.
    fn grown_capacity(&self) -> usize {
        let doubled = self
            .slot_count()
            .checked_mul(2)
            .expect("capacity overflow");
        doubled.max(capacity_for(self.used + 1))
    }

    /// Reserves capacity for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        let layout = self.layout.layout;
        self.try_reserve(additional)
            .unwrap_or_else(|_| handle_alloc_error(layout));
    }

    /// Fallible form of [`reserve`]; the table is unchanged on error.
    ///
    /// [`reserve`]: OrderedTable::reserve
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let required = self
            .used
            .checked_add(additional)
            .ok_or(Error::OutOfMemory)?;
        if required + self.tombstones > usable(self.slot_count()) {
            let target = capacity_for(required).max(self.slot_count());
            self.try_rebuild(target)?;
        }
        Ok(())
    }

    /// Rebuilds the table at `new_capacity` slots, replaying live entries
    /// in insertion order and dropping all tombstones.
    ///
    /// On allocation failure the table is untouched. The order chain in the
    /// new arrays is re-threaded during the replay, so iteration order is
    /// preserved exactly.
    fn try_rebuild(&mut self, new_capacity: usize) -> Result<(), Error> {
        debug_assert!(new_capacity.is_power_of_two());
        debug_assert!(new_capacity >= MIN_CAPACITY);
        debug_assert!(self.used <= usable(new_capacity));

        let new_layout = DataLayout::new::<T>(new_capacity);
        let new_alloc = alloc_arrays(new_layout, new_capacity)?;

        let old_layout = core::mem::replace(&mut self.layout, new_layout);
        let old_alloc = core::mem::replace(&mut self.alloc, new_alloc);
        let old_slot_count = self.slot_count();
        self.group_mask = new_capacity / GROUP_WIDTH - 1;

        // SAFETY: `old_alloc` is the previous live allocation; its slot
        // array begins at the old `slots_offset` and spans the old slot
        // count.
        let old_slots: NonNull<[MaybeUninit<Slot<T>>]> = unsafe {
            NonNull::slice_from_raw_parts(
                old_alloc.add(old_layout.slots_offset).cast(),
                old_slot_count,
            )
        };

        let mut cursor = self.head;
        let mut new_head = NIL;
        let mut new_tail = NIL;

        // SAFETY: The old chain visits exactly the old live slots
        // (invariant 3), each of which is initialized. Every value is read
        // out exactly once and written into a fresh EMPTY slot of the new
        // arrays, so ownership transfers without drops or duplication; the
        // old allocation is then freed without running destructors for the
        // moved-out contents.
        unsafe {
            while cursor != NIL {
                let slot = old_slots.as_ref().get_unchecked(cursor).assume_init_read();
                cursor = slot.next;

                let index = self.find_insert_slot(slot.hash);
                self.set_ctrl(index, h2(slot.hash));
                self.slots_ptr()
                    .as_mut()
                    .get_unchecked_mut(index)
                    .write(Slot {
                        hash: slot.hash,
                        prev: new_tail,
                        next: NIL,
                        value: slot.value,
                    });

                if new_tail == NIL {
                    new_head = index;
                } else {
                    self.slot_mut(new_tail).next = index;
                }
                new_tail = index;
            }

            alloc::alloc::dealloc(old_alloc.as_ptr(), old_layout.layout);
        }

        self.head = new_head;
        self.tail = new_tail;
        self.tombstones = 0;
        self.version += 1;
        self.epoch += 1;

        Ok(())
    }

    /// Removes all entries from the table, keeping its current capacity.
    pub fn clear(&mut self) {
        // SAFETY: Control bytes precisely track initialized slots
        // (invariant 2); each live value is dropped exactly once before the
        // control array is reset.
        unsafe {
            if core::mem::needs_drop::<T>() && self.used > 0 {
                for index in 0..self.slot_count() {
                    if is_full(self.ctrl(index)) {
                        self.slots_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            core::ptr::write_bytes(self.alloc.as_ptr(), EMPTY, self.slot_count());
        }

        self.used = 0;
        self.tombstones = 0;
        self.head = NIL;
        self.tail = NIL;
        self.version += 1;
        self.epoch += 1;
    }

    /// Returns an iterator over the values in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            table: self,
            cursor: self.head,
            remaining: self.used,
        }
    }

    /// Returns an iterator yielding mutable references in insertion order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            slots: self.slots_ptr(),
            cursor: self.head,
            remaining: self.used,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator that removes and yields all values in insertion
    /// order.
    ///
    /// The table is emptied up front; dropping the iterator drops any
    /// values it has not yielded.
    pub fn drain(&mut self) -> Drain<'_, T> {
        let cursor = self.head;
        let remaining = self.used;

        // SAFETY: Resetting the control array detaches every slot from the
        // table's point of view; the drain iterator below is the sole owner
        // of the values still sitting in the slot array and reaches them
        // through the captured chain head.
        unsafe {
            core::ptr::write_bytes(self.alloc.as_ptr(), EMPTY, self.slot_count());
        }

        self.used = 0;
        self.tombstones = 0;
        self.head = NIL;
        self.tail = NIL;
        self.version += 1;
        self.epoch += 1;

        Drain {
            table: self,
            cursor,
            remaining,
        }
    }

    /// Returns a detached cursor positioned before the first entry.
    ///
    /// Unlike [`iter`], a cursor does not borrow the table between steps;
    /// it re-validates against the table on every [`Cursor::advance`] call
    /// and fails with [`Error::MutatedDuringIteration`] once a structural
    /// mutation (insert of a new entry, removal, clear, or rebuild) has
    /// occurred. Value replacement for an existing entry does not disturb
    /// it.
    ///
    /// [`iter`]: OrderedTable::iter
    pub fn cursor(&self) -> Cursor {
        Cursor {
            next: self.head,
            epoch: self.epoch,
        }
    }

    /// Collects debug statistics about the table's occupancy.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        DebugStats {
            used: self.used,
            tombstones: self.tombstones,
            slots: self.slot_count(),
            capacity: usable(self.slot_count()),
            load_factor: (self.used + self.tombstones) as f64 / self.slot_count() as f64,
        }
    }

    /// Computes a histogram of probe lengths over the live entries.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut by_groups = [0usize; GROUP_WIDTH];

        let mut cursor = self.head;
        while cursor != NIL {
            // SAFETY: The chain visits exactly the live slots.
            let slot = unsafe { self.slot_ref(cursor) };

            let home = cursor / GROUP_WIDTH;
            let mut seq = ProbeSeq::new(slot.hash, self.group_mask);
            let mut length = 1usize;
            while seq.group != home {
                seq.move_next(self.group_mask);
                length += 1;
            }
            by_groups[(length - 1).min(GROUP_WIDTH - 1)] += 1;

            cursor = slot.next;
        }

        ProbeHistogram { by_groups }
    }
}

/// A view into a single slot of an [`OrderedTable`], which is either
/// occupied or vacant.
///
/// This enum is constructed from the [`entry`] method on [`OrderedTable`].
///
/// [`entry`]: OrderedTable::entry
pub enum Entry<'a, T> {
    /// The slot holds a live value.
    Occupied(OccupiedEntry<'a, T>),
    /// The slot is available for insertion.
    Vacant(VacantEntry<'a, T>),
}

impl<'a, T> Entry<'a, T> {
    /// Returns the value, inserting `default` if the slot was vacant.
    pub fn or_insert(self, default: T) -> &'a mut T {
        match self {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(default),
        }
    }

    /// Returns the value, inserting the result of `default` if the slot
    /// was vacant.
    pub fn or_insert_with(self, default: impl FnOnce() -> T) -> &'a mut T {
        match self {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(default()),
        }
    }

    /// Applies `f` to the value if the slot is occupied.
    pub fn and_modify(self, f: impl FnOnce(&mut T)) -> Self {
        match self {
            Entry::Occupied(mut occupied) => {
                f(occupied.get_mut());
                Entry::Occupied(occupied)
            }
            vacant => vacant,
        }
    }
}

/// A view into a vacant slot in an [`OrderedTable`].
///
/// Inserting through this appends the new entry to the insertion order.
pub struct VacantEntry<'a, T> {
    table: &'a mut OrderedTable<T>,
    hash: u64,
    index: usize,
}

impl<'a, T> VacantEntry<'a, T> {
    /// Inserts a value into the vacant slot and returns a mutable
    /// reference to it. The entry takes the latest position in the
    /// insertion order.
    pub fn insert(self, value: T) -> &'a mut T {
        let VacantEntry { table, hash, index } = self;

        // SAFETY: A `VacantEntry` is only constructed for an in-bounds
        // empty-or-deleted slot with room for one more entry. Writing the
        // slot before its control byte goes full keeps invariant 2; the
        // previous tail (if any) is live per invariant 3.
        unsafe {
            if table.ctrl(index) == DELETED {
                table.tombstones -= 1;
            }

            let prev_tail = table.tail;
            table
                .slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(Slot {
                    hash,
                    prev: prev_tail,
                    next: NIL,
                    value,
                });
            table.set_ctrl(index, h2(hash));

            if prev_tail == NIL {
                table.head = index;
            } else {
                table.slot_mut(prev_tail).next = index;
            }
            table.tail = index;
        }

        table.used += 1;
        table.version += 1;
        table.epoch += 1;

        // SAFETY: The slot was just initialized.
        unsafe { &mut table.slot_mut(index).value }
    }
}

/// A view into an occupied slot in an [`OrderedTable`].
///
/// Replacing the value through this keeps the entry's position in the
/// insertion order; removing it unlinks the order record.
pub struct OccupiedEntry<'a, T> {
    table: &'a mut OrderedTable<T>,
    index: usize,
}

// Safety invariant for OccupiedEntry methods: an `OccupiedEntry` is only
// created after `probe` finds a live slot, so `index` is in bounds and the
// slot is initialized for as long as the entry borrows the table.
impl<'a, T> OccupiedEntry<'a, T> {
    /// Returns a reference to the value.
    pub fn get(&self) -> &T {
        // SAFETY: See the invariant note above.
        unsafe { &self.table.slot_ref(self.index).value }
    }

    /// Returns a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: See the invariant note above.
        unsafe { &mut self.table.slot_mut(self.index).value }
    }

    /// Converts the entry into a mutable reference tied to the table's
    /// borrow.
    pub fn into_mut(self) -> &'a mut T {
        // SAFETY: See the invariant note above.
        unsafe { &mut self.table.slot_mut(self.index).value }
    }

    /// Replaces the value, returning the old one. The entry keeps its
    /// position in the insertion order, and the replacement counts as a
    /// mutation for [`OrderedTable::version`].
    pub fn insert(&mut self, value: T) -> T {
        self.update(|stored| core::mem::replace(stored, value))
    }

    /// Applies `f` to the stored value, recording the call as one mutation
    /// in the table's version counter. The entry keeps its position in the
    /// insertion order.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        // SAFETY: See the invariant note above.
        let result = f(unsafe { &mut self.table.slot_mut(self.index).value });
        self.table.version += 1;
        result
    }

    /// Removes the entry, returning its value.
    pub fn remove(self) -> T {
        // SAFETY: See the invariant note above.
        unsafe { self.table.remove_at(self.index) }
    }
}

/// An iterator over the values of an [`OrderedTable`] in insertion order.
///
/// This struct is created by the [`iter`] method on [`OrderedTable`].
///
/// [`iter`]: OrderedTable::iter
pub struct Iter<'a, T> {
    table: &'a OrderedTable<T>,
    cursor: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }

        // SAFETY: The order chain visits exactly the live slots, and the
        // shared borrow of the table keeps them live for 'a.
        let slot = unsafe { self.table.slot_ref(self.cursor) };
        self.cursor = slot.next;
        self.remaining -= 1;
        Some(&slot.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// An iterator over the values of an [`OrderedTable`] in insertion order,
/// yielding mutable references.
///
/// This struct is created by the [`iter_mut`] method on [`OrderedTable`].
///
/// [`iter_mut`]: OrderedTable::iter_mut
pub struct IterMut<'a, T> {
    slots: NonNull<[MaybeUninit<Slot<T>>]>,
    cursor: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut OrderedTable<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }

        // SAFETY: The order chain is acyclic and visits exactly the live
        // slots, so each call borrows a distinct slot; the exclusive borrow
        // of the table (held via `_marker`) keeps them alive and unaliased
        // for 'a.
        unsafe {
            let slot: &'a mut Slot<T> = self
                .slots
                .as_mut()
                .get_unchecked_mut(self.cursor)
                .assume_init_mut();
            self.cursor = slot.next;
            self.remaining -= 1;
            Some(&mut slot.value)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

/// A draining iterator over the values of an [`OrderedTable`] in insertion
/// order.
///
/// This struct is created by the [`drain`] method on [`OrderedTable`].
/// The table is emptied when the iterator is created; unyielded values are
/// dropped with the iterator.
///
/// [`drain`]: OrderedTable::drain
pub struct Drain<'a, T> {
    table: &'a mut OrderedTable<T>,
    cursor: usize,
    remaining: usize,
}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }

        // SAFETY: The captured chain visits each formerly-live slot exactly
        // once. The table's control array was reset when the drain was
        // created, so this iterator is the only owner of the remaining
        // values, and each is read out exactly once.
        let slot = unsafe {
            self.table
                .slots_ptr()
                .as_ref()
                .get_unchecked(self.cursor)
                .assume_init_read()
        };
        self.cursor = slot.next;
        self.remaining -= 1;
        Some(slot.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

/// An owned iterator over the values of an [`OrderedTable`] in insertion
/// order.
///
/// This struct is created by the `into_iter` method on [`OrderedTable`].
pub struct IntoIter<T> {
    table: OrderedTable<T>,
    cursor: usize,
    remaining: usize,
}

impl<T> IntoIterator for OrderedTable<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(mut self) -> IntoIter<T> {
        let cursor = self.head;
        let remaining = self.used;

        // SAFETY: Resetting the control array detaches every slot, exactly
        // as in `drain`; the iterator owns the table and reaches the values
        // through the captured chain head. The table's own Drop then sees
        // an empty table and only frees the allocation.
        unsafe {
            core::ptr::write_bytes(self.alloc.as_ptr(), EMPTY, self.slot_count());
        }
        self.used = 0;
        self.tombstones = 0;
        self.head = NIL;
        self.tail = NIL;

        IntoIter {
            table: self,
            cursor,
            remaining,
        }
    }
}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }

        // SAFETY: Identical to `Drain`: the captured chain visits each
        // formerly-live slot exactly once and this iterator is the sole
        // owner of the values left in the slot array.
        let slot = unsafe {
            self.table
                .slots_ptr()
                .as_ref()
                .get_unchecked(self.cursor)
                .assume_init_read()
        };
        self.cursor = slot.next;
        self.remaining -= 1;
        Some(slot.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

/// A detached traversal position over an [`OrderedTable`].
///
/// A cursor holds no borrow between steps. Each [`advance`] re-validates
/// the cursor against the table's structural state: once a new entry has
/// been inserted, an entry removed, the table cleared, or the slots
/// rebuilt, the cursor reports [`Error::MutatedDuringIteration`] and stays
/// exhausted. Replacing the value of an existing entry does not invalidate
/// a cursor.
///
/// [`advance`]: Cursor::advance
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    next: usize,
    epoch: u64,
}

impl Cursor {
    /// Advances to the next entry of `table`, returning `Ok(None)` once the
    /// traversal is complete.
    ///
    /// Returns [`Error::MutatedDuringIteration`] if the table has been
    /// structurally mutated since the cursor was created, or if the cursor
    /// was created by a different table.
    pub fn advance<'a, T>(&mut self, table: &'a OrderedTable<T>) -> Result<Option<&'a T>, Error> {
        if self.epoch != table.epoch {
            return Err(Error::MutatedDuringIteration);
        }
        if self.next == NIL {
            return Ok(None);
        }
        // A cursor from another table can carry an arbitrary index even
        // when the epochs coincide; reject anything that is not a live slot
        // here rather than trusting the position.
        //
        // SAFETY: Bounds are checked immediately before the control read.
        if self.next >= table.slot_count() || unsafe { !is_full(table.ctrl(self.next)) } {
            return Err(Error::MutatedDuringIteration);
        }

        // SAFETY: The slot was just verified live and in bounds.
        let slot = unsafe { table.slot_ref(self.next) };
        self.next = slot.next;
        Ok(Some(&slot.value))
    }
}
