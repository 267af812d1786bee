use hashbrown::hash_table::{self, HashTable};

/// Hash table of indices into an external item vector.
///
/// Indices start out as `u32` and are upgraded to `usize` once an index no longer fits.
#[derive(Debug, Clone)]
pub enum IndexTable {
    Small(HashTable<u32>),
    Large(HashTable<usize>),
}

impl Default for IndexTable {
    fn default() -> Self {
        IndexTable::Small(HashTable::new())
    }
}

impl IndexTable {
    pub fn with_capacity(capacity: usize) -> Self {
        if u32::try_from(capacity).is_ok() {
            IndexTable::Small(HashTable::with_capacity(capacity))
        } else {
            IndexTable::Large(HashTable::with_capacity(capacity))
        }
    }

    #[inline(always)]
    fn as_small(index: usize) -> u32 {
        u32::try_from(index).expect("index table was not grown for this index")
    }

    /// Returns the stored index accepted by `eq`, or inserts `index` and returns it.
    ///
    /// The second component is `true` if `index` was inserted.
    #[inline(always)]
    pub fn find_or_insert(
        &mut self,
        hash: u64,
        index: usize,
        mut eq: impl FnMut(usize) -> bool,
        hasher: impl Fn(usize) -> u64,
    ) -> (usize, bool) {
        self.grow_for(index, &hasher);
        match self {
            IndexTable::Small(table) => match table.entry(
                hash,
                |&found| eq(found as usize),
                |&found| hasher(found as usize),
            ) {
                hash_table::Entry::Occupied(entry) => (*entry.get() as usize, false),
                hash_table::Entry::Vacant(entry) => {
                    entry.insert(Self::as_small(index));
                    (index, true)
                }
            },
            IndexTable::Large(table) => {
                match table.entry(hash, |&found| eq(found), |&found| hasher(found)) {
                    hash_table::Entry::Occupied(entry) => (*entry.get(), false),
                    hash_table::Entry::Vacant(entry) => {
                        entry.insert(index);
                        (index, true)
                    }
                }
            }
        }
    }

    #[inline(always)]
    pub fn find(&self, hash: u64, mut eq: impl FnMut(usize) -> bool) -> Option<usize> {
        match self {
            IndexTable::Small(table) => table
                .find(hash, |&index| eq(index as usize))
                .map(|&index| index as usize),
            IndexTable::Large(table) => table.find(hash, |&index| eq(index)).copied(),
        }
    }

    #[inline(always)]
    pub fn is_small(&self) -> bool {
        matches!(self, IndexTable::Small(_))
    }

    #[inline(always)]
    pub fn grow_for(&mut self, index: usize, hasher: impl Fn(usize) -> u64) {
        if u32::try_from(index).is_err() && self.is_small() {
            self.grow_cold(hasher)
        }
    }

    #[inline(never)]
    #[cold]
    fn grow_cold(&mut self, hasher: impl Fn(usize) -> u64) {
        let IndexTable::Small(old_table) =
            std::mem::replace(self, IndexTable::Large(HashTable::new()))
        else {
            unreachable!()
        };
        let IndexTable::Large(new_table) = self else {
            unreachable!()
        };
        new_table.reserve(old_table.len(), |&j| hasher(j));
        for i in old_table {
            new_table.insert_unique(hasher(i as usize), i as usize, |&j| hasher(j));
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        match self {
            IndexTable::Small(table) => table.len(),
            IndexTable::Large(table) => table.len(),
        }
    }

    #[inline(always)]
    pub fn clear(&mut self) {
        match self {
            IndexTable::Small(table) => table.clear(),
            IndexTable::Large(table) => table.clear(),
        }
    }

    #[inline(always)]
    pub fn reserve(&mut self, additional: usize, hasher: impl Fn(usize) -> u64) {
        self.grow_for((self.len() + additional).saturating_sub(1), &hasher);
        match self {
            IndexTable::Small(table) => table.reserve(additional, |&index| hasher(index as usize)),
            IndexTable::Large(table) => table.reserve(additional, |&index| hasher(index)),
        }
    }

    /// Heap memory used by the table in bytes, including control bytes.
    pub fn mem_usage(&self) -> usize {
        match self {
            IndexTable::Small(table) => table.capacity() * (std::mem::size_of::<u32>() + 1),
            IndexTable::Large(table) => table.capacity() * (std::mem::size_of::<usize>() + 1),
        }
    }
}
