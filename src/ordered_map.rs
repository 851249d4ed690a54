use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::Error;
use crate::ordered_table::Entry as TableEntry;
use crate::ordered_table::OrderedTable;

/// A hash map that preserves insertion order, implemented over the
/// SwissTable-style [`OrderedTable`].
///
/// `OrderedMap<K, V, S>` stores key-value pairs where keys implement
/// `Hash + Eq` and uses a configurable hasher builder `S` to hash keys.
/// Iteration yields entries in the order they were first inserted.
/// Replacing the value of a present key keeps its position; removing a key
/// and inserting it again moves it to the end.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead, plus the size of `(K, V)`, a
///   cached `u64` hash, and two order-link words per slot.
#[derive(Clone)]
pub struct OrderedMap<K, V, S> {
    table: OrderedTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for OrderedMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ordhash::OrderedMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: OrderedMap<i32, String, _> = OrderedMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new map with the specified capacity and hasher builder.
    ///
    /// The actual capacity may be larger than requested due to the
    /// power-of-two, group-based organization of the underlying table.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: OrderedTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of entries the map can hold before growing.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the mutation counter of the underlying table. It increases
    /// on every successful mutation, including value replacement.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Removes all entries from the map, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves capacity for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key is already present its value is replaced and the old
    /// value returned; the key keeps its position in the insertion order.
    /// A new key is appended at the end of the order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ordhash::OrderedMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = OrderedMap::with_hasher(SimpleHasher);
    /// assert_eq!(map.insert("a", 1), None);
    /// assert_eq!(map.insert("a", 2), Some(1));
    /// assert_eq!(map.get(&"a"), Some(&2));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_key(&key);
        match self.table.entry(hash, |(stored, _)| *stored == key) {
            TableEntry::Occupied(mut occupied) => {
                Some(occupied.update(|(_, stored)| core::mem::replace(stored, value)))
            }
            TableEntry::Vacant(vacant) => {
                vacant.insert((key, value));
                None
            }
        }
    }

    /// Inserts a key-value pair, surfacing allocation failure.
    ///
    /// Behaves like [`insert`], but if the table must grow and the
    /// allocator fails, returns [`Error::OutOfMemory`] with the map
    /// unchanged instead of aborting.
    ///
    /// [`insert`]: OrderedMap::insert
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        let hash = self.hash_key(&key);
        match self.table.try_entry(hash, |(stored, _)| *stored == key)? {
            TableEntry::Occupied(mut occupied) => {
                Ok(Some(occupied.update(|(_, stored)| core::mem::replace(stored, value))))
            }
            TableEntry::Vacant(vacant) => {
                vacant.insert((key, value));
                Ok(None)
            }
        }
    }

    /// Returns a reference to the value for the given key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_key(key);
        self.table
            .find(hash, |(stored, _)| stored == key)
            .map(|(_, value)| value)
    }

    /// Returns a mutable reference to the value for the given key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_key(key);
        self.table
            .find_mut(hash, |(stored, _)| stored == key)
            .map(|(_, value)| value)
    }

    /// Returns the stored key and value for the given key.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let hash = self.hash_key(key);
        self.table
            .find(hash, |(stored, _)| stored == key)
            .map(|(stored, value)| (stored, value))
    }

    /// Returns `true` if the map contains the given key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// The entry is unlinked from the insertion order; inserting the key
    /// again later places it at the end.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key from the map, returning the stored key and value if
    /// the key was present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_key(key);
        self.table.remove(hash, |(stored, _)| stored == key)
    }

    /// Gets the entry for the given key for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ordhash::OrderedMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = OrderedMap::with_hasher(SimpleHasher);
    /// *map.entry("counter").or_insert(0) += 1;
    /// *map.entry("counter").or_insert(0) += 1;
    /// assert_eq!(map.get(&"counter"), Some(&2));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_key(&key);
        match self.table.entry(hash, |(stored, _)| *stored == key) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Returns an iterator over the key-value pairs in insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ordhash::OrderedMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = OrderedMap::with_hasher(SimpleHasher);
    /// map.insert("a", 1);
    /// map.insert("b", 2);
    /// let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    /// assert_eq!(pairs, [("a", 1), ("b", 2)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys in insertion order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values in insertion order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable values in insertion order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator that removes and yields all pairs in insertion
    /// order. The map is emptied even if the iterator is dropped early.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns a detached cursor positioned before the first entry.
    ///
    /// A cursor holds no borrow between steps; each advance re-validates
    /// against the map and fails with [`Error::MutatedDuringIteration`]
    /// once a new key has been inserted, a key removed, the map cleared,
    /// or the table rebuilt. Replacing the value of a present key does not
    /// disturb it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ordhash::{Error, OrderedMap};
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = OrderedMap::with_hasher(SimpleHasher);
    /// map.insert("x", 1);
    /// let mut cursor = map.cursor();
    /// assert_eq!(cursor.advance(&map), Ok(Some((&"x", &1))));
    ///
    /// map.insert("y", 2);
    /// assert_eq!(cursor.advance(&map), Err(Error::MutatedDuringIteration));
    /// ```
    pub fn cursor(&self) -> Cursor {
        Cursor {
            inner: self.table.cursor(),
        }
    }

    /// Collects debug statistics about the underlying table's occupancy.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::ordered_table::DebugStats {
        self.table.debug_stats()
    }

    /// Computes a histogram of probe lengths over the live entries.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> crate::ordered_table::ProbeHistogram {
        self.table.probe_histogram()
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a new empty map using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new empty map with the specified capacity using the
    /// default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> PartialEq for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    /// Maps compare equal when they hold the same keys with equal values;
    /// insertion order does not participate.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|o| *o == *value))
    }
}

impl<K, V, S> Eq for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V, S> IntoIterator for OrderedMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// A view into a single entry in a map, which is either occupied or vacant.
///
/// This enum is constructed from the [`entry`] method on [`OrderedMap`].
///
/// [`entry`]: OrderedMap::entry
pub enum Entry<'a, K, V> {
    /// The key is present in the map.
    Occupied(OccupiedEntry<'a, K, V>),
    /// The key is not present in the map.
    Vacant(VacantEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Returns the value, inserting `default` if the key was absent.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(default),
        }
    }

    /// Returns the value, inserting the result of `default` if the key was
    /// absent.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => vacant.insert(default()),
        }
    }

    /// Applies `f` to the value if the key is present.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut occupied) => {
                f(occupied.get_mut());
                Entry::Occupied(occupied)
            }
            vacant => vacant,
        }
    }

    /// Returns a reference to the entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(occupied) => occupied.key(),
            Entry::Vacant(vacant) => vacant.key(),
        }
    }
}

impl<'a, K, V> Entry<'a, K, V>
where
    V: Default,
{
    /// Returns the value, inserting the default value if the key was
    /// absent.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(V::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V> {
    entry: crate::ordered_table::VacantEntry<'a, (K, V)>,
    key: K,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// Gets a reference to the key that would be used for insertion.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key without inserting.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts a value, appending the entry to the insertion order, and
    /// returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V> {
    entry: crate::ordered_table::OccupiedEntry<'a, (K, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value in the entry, returning the old value. The key
    /// keeps its position in the insertion order.
    pub fn insert(&mut self, value: V) -> V {
        self.entry
            .update(|(_, stored)| core::mem::replace(stored, value))
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of an [`OrderedMap`] in insertion
/// order.
pub struct Iter<'a, K, V> {
    inner: crate::ordered_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// An iterator over the keys of an [`OrderedMap`] in insertion order.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of an [`OrderedMap`] in insertion order.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// An iterator over mutable values of an [`OrderedMap`] in insertion order.
pub struct ValuesMut<'a, K, V> {
    inner: crate::ordered_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of an [`OrderedMap`] in
/// insertion order.
pub struct Drain<'a, K, V> {
    inner: crate::ordered_table::Drain<'a, (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

/// An owned iterator over the key-value pairs of an [`OrderedMap`] in
/// insertion order.
pub struct IntoIter<K, V> {
    inner: crate::ordered_table::IntoIter<(K, V)>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

/// A detached traversal position over an [`OrderedMap`].
///
/// Created by the [`cursor`] method; see it for the invalidation contract.
///
/// [`cursor`]: OrderedMap::cursor
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    inner: crate::ordered_table::Cursor,
}

impl Cursor {
    /// Advances to the next entry of `map`, returning `Ok(None)` once the
    /// traversal is complete and [`Error::MutatedDuringIteration`] if the
    /// map has been structurally mutated since the cursor was created.
    pub fn advance<'a, K, V, S>(
        &mut self,
        map: &'a OrderedMap<K, V, S>,
    ) -> Result<Option<(&'a K, &'a V)>, Error> {
        Ok(self.inner.advance(&map.table)?.map(|(k, v)| (k, v)))
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Hashes a `u64` key to itself, for tests that construct adversarial
    /// hash values directly.
    #[derive(Clone, Default)]
    struct IdentityHashBuilder;

    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &byte in bytes {
                self.0 = self.0.rotate_left(8) ^ u64::from(byte);
            }
        }

        fn write_u64(&mut self, value: u64) {
            self.0 = value;
        }
    }

    impl BuildHasher for IdentityHashBuilder {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> Self::Hasher {
            IdentityHasher(0)
        }
    }

    fn pairs<S: BuildHasher>(map: &OrderedMap<&'static str, i32, S>) -> Vec<(&'static str, i32)> {
        map.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn replace_keeps_iteration_position() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        map.insert("b", 20);

        assert_eq!(pairs(&map), [("a", 1), ("b", 20), ("c", 3)]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn remove_and_reinsert_moves_to_back() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        map.remove(&"a");
        map.insert("a", 10);

        assert_eq!(pairs(&map), [("b", 2), ("c", 3), ("a", 10)]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn growth_preserves_iteration_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        for i in 0..100u64 {
            map.insert(i, i * i);
        }

        assert!(map.capacity() >= 100);
        let items: Vec<(u64, u64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u64, u64)> = (0..100).map(|i| (i, i * i)).collect();
        assert_eq!(items, expected);
    }

    #[test]
    fn mass_delete_then_lookup() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        for i in 0..1000u64 {
            map.insert(i, i);
        }
        for i in 0..990u64 {
            assert_eq!(map.remove(&i), Some(i));
        }

        assert_eq!(map.len(), 10);
        assert_eq!(map.get(&995), Some(&995));
        assert_eq!(map.get(&0), None);
        let keys: Vec<u64> = map.keys().copied().collect();
        assert_eq!(keys, (990..1000).collect::<Vec<_>>());
    }

    #[test]
    fn delete_all_then_insert_one() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        for i in 0..100u64 {
            map.insert(i, i);
        }
        for i in 0..100u64 {
            map.remove(&i);
        }
        assert!(map.is_empty());

        map.insert(7, 7);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&7), Some(&7));
    }

    #[test]
    fn adversarial_shared_hash_bits() {
        // 64 keys sharing the low 14 bits of their hash: identical
        // fingerprints and identical starting groups for every capacity
        // this test reaches.
        let mut map: OrderedMap<u64, u64, _> = OrderedMap::with_hasher(IdentityHashBuilder);
        let keys: Vec<u64> = (0..64u64).map(|i| (i << 14) | 0x2A57).collect();

        for (i, &key) in keys.iter().enumerate() {
            map.insert(key, i as u64);
        }
        assert_eq!(map.len(), 64);
        for (i, &key) in keys.iter().enumerate() {
            assert_eq!(map.get(&key), Some(&(i as u64)), "key {key:#x}");
        }
        let in_order: Vec<u64> = map.keys().copied().collect();
        assert_eq!(in_order, keys);
    }

    #[test]
    fn cursor_invalidated_by_insert() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("x", 1);
        map.insert("y", 2);

        let mut cursor = map.cursor();
        assert_eq!(cursor.advance(&map), Ok(Some((&"x", &1))));

        map.insert("z", 3);
        assert_eq!(cursor.advance(&map), Err(Error::MutatedDuringIteration));
        // The failure is sticky for the mutated table.
        assert_eq!(cursor.advance(&map), Err(Error::MutatedDuringIteration));
    }

    #[test]
    fn cursor_survives_value_replacement() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("x", 1);
        map.insert("y", 2);

        let mut cursor = map.cursor();
        assert_eq!(cursor.advance(&map), Ok(Some((&"x", &1))));
        map.insert("y", 20);
        assert_eq!(cursor.advance(&map), Ok(Some((&"y", &20))));
        assert_eq!(cursor.advance(&map), Ok(None));
    }

    #[test]
    fn test_new_and_with_hasher() {
        let map: OrderedMap<i32, String, SipHashBuilder> = OrderedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        let map2 = OrderedMap::<i32, String, _>::with_hasher(SipHashBuilder::default());
        assert!(map2.is_empty());
        assert_eq!(map2.len(), 0);
    }

    #[test]
    fn test_with_capacity() {
        let map: OrderedMap<i32, String, SipHashBuilder> = OrderedMap::with_capacity(100);
        assert!(map.capacity() >= 100);
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());

        assert_eq!(map.insert(1, "hello".to_string()), None);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"hello".to_string()));
        assert_eq!(map.get(&2), None);

        assert_eq!(
            map.insert(1, "world".to_string()),
            Some("hello".to_string())
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"world".to_string()));
    }

    #[test]
    fn test_get_mut_and_values_mut() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert(1, 10);
        map.insert(2, 20);

        if let Some(value) = map.get_mut(&1) {
            *value += 1;
        }
        for value in map.values_mut() {
            *value *= 10;
        }

        assert_eq!(map.get(&1), Some(&110));
        assert_eq!(map.get(&2), Some(&200));
    }

    #[test]
    fn test_remove_entry() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("k".to_string(), 5);

        assert_eq!(map.remove_entry(&"k".to_string()), Some(("k".to_string(), 5)));
        assert_eq!(map.remove_entry(&"k".to_string()), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_entry_api() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());

        *map.entry("a").or_insert(0) += 1;
        *map.entry("a").or_insert(0) += 1;
        assert_eq!(map.get(&"a"), Some(&2));

        map.entry("b").or_insert_with(|| 42);
        assert_eq!(map.get(&"b"), Some(&42));

        map.entry("a").and_modify(|v| *v *= 10);
        assert_eq!(map.get(&"a"), Some(&20));

        map.entry("c").and_modify(|v| *v += 1).or_insert(7);
        assert_eq!(map.get(&"c"), Some(&7));

        let entry = map.entry("c");
        assert_eq!(entry.key(), &"c");
        assert_eq!(*entry.or_default(), 7);

        assert_eq!(pairs(&map), [("a", 20), ("b", 42), ("c", 7)]);
    }

    #[test]
    fn test_occupied_entry_replace_and_remove() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("a", 1);
        map.insert("b", 2);

        match map.entry("a") {
            Entry::Occupied(mut occupied) => {
                assert_eq!(occupied.key(), &"a");
                assert_eq!(occupied.insert(10), 1);
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        assert_eq!(pairs(&map), [("a", 10), ("b", 2)]);

        match map.entry("a") {
            Entry::Occupied(occupied) => {
                assert_eq!(occupied.remove_entry(), ("a", 10));
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        assert_eq!(pairs(&map), [("b", 2)]);
    }

    #[test]
    fn test_keys_values_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("one", 1);
        map.insert("two", 2);
        map.insert("three", 3);

        let keys: Vec<&str> = map.keys().copied().collect();
        assert_eq!(keys, ["one", "two", "three"]);

        let values: Vec<i32> = map.values().copied().collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn test_drain_in_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        for i in 0..20 {
            map.insert(i, i * 2);
        }

        let drained: Vec<(i32, i32)> = map.drain().collect();
        assert_eq!(drained, (0..20).map(|i| (i, i * 2)).collect::<Vec<_>>());
        assert!(map.is_empty());
    }

    #[test]
    fn test_into_iter_in_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);

        let owned: Vec<(String, i32)> = map.into_iter().collect();
        assert_eq!(owned, [("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_from_iterator_and_extend() {
        let mut map: OrderedMap<i32, i32, SipHashBuilder> =
            (0..10).map(|i| (i, i)).collect();
        assert_eq!(map.len(), 10);

        map.extend((10..20).map(|i| (i, i)));
        assert_eq!(map.len(), 20);
        let keys: Vec<i32> = map.keys().copied().collect();
        assert_eq!(keys, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_equality_ignores_order() {
        let mut left = OrderedMap::with_hasher(SipHashBuilder::default());
        left.insert("a", 1);
        left.insert("b", 2);

        let mut right = OrderedMap::with_hasher(SipHashBuilder::default());
        right.insert("b", 2);
        right.insert("a", 1);

        assert_eq!(left, right);

        right.insert("c", 3);
        assert_ne!(left, right);
    }

    #[test]
    fn test_debug_in_insertion_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("z", 26);
        map.insert("a", 1);

        assert_eq!(format!("{map:?}"), "{\"z\": 26, \"a\": 1}");
    }

    #[test]
    fn test_version_counts_replacements() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        let v0 = map.version();
        map.insert("a", 1);
        let v1 = map.version();
        map.insert("a", 2);
        let v2 = map.version();
        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn test_try_insert() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        assert_eq!(map.try_insert("a", 1), Ok(None));
        assert_eq!(map.try_insert("a", 2), Ok(Some(1)));
        assert_eq!(map.get(&"a"), Some(&2));
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        for i in 0..50 {
            map.insert(i, i);
        }
        map.clear();
        assert!(map.is_empty());

        map.insert(3, 3);
        map.insert(1, 1);
        let keys: Vec<i32> = map.keys().copied().collect();
        assert_eq!(keys, [3, 1]);
    }

    #[test]
    fn test_collision_handling() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());

        for i in 0..1000 {
            map.insert(i, i * 2);
        }
        assert_eq!(map.len(), 1000);

        for i in (0..1000).step_by(2) {
            assert_eq!(map.remove(&i), Some(i * 2));
        }
        assert_eq!(map.len(), 500);

        for i in (1..1000).step_by(2) {
            assert_eq!(map.get(&i), Some(&(i * 2)));
        }
    }

    #[test]
    fn test_default_trait() {
        let map: OrderedMap<i32, String, SipHashBuilder> = OrderedMap::default();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_clone_keeps_order() {
        let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
        map.insert("b", 2);
        map.insert("a", 1);

        let cloned = map.clone();
        assert_eq!(pairs(&cloned), [("b", 2), ("a", 1)]);

        map.remove(&"b");
        assert_eq!(cloned.len(), 2);
    }
}
