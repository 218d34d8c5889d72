//! Bounded object pool for reusing short-lived scratch objects.
//!
//! Instead of allocating a fresh buffer or marker every time geometry is
//! rebuilt, callers borrow an instance with [`ObjectPool::get`] and hand it
//! back with [`ObjectPool::release`]. The pool never grows beyond its
//! `max_size`: once full and fully borrowed, the instance borrowed longest
//! ago is recycled even though it is still active. Handles therefore carry a
//! generation, and a handle whose slot was recycled simply stops resolving.

/// Borrow token for a pooled instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    slot: u32,
    generation: u32,
}

impl PoolHandle {
    /// Index of the underlying slot. Two handles with the same slot refer to
    /// the same instance, possibly across a recycle.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

/// A pooled instance and its borrow state.
struct PooledEntry<T> {
    value: T,
    active: bool,
    generation: u32,
    /// Borrow sequence number of the current borrow.
    borrowed_at: u64,
}

/// Allocation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances constructed by the factory.
    pub created: u64,
    /// Borrows served by an inactive pooled instance.
    pub reused: u64,
    /// Borrows served by forcibly taking an active instance.
    pub recycled: u64,
}

type Factory<T> = Box<dyn FnMut() -> T + Send>;
type Reset<T> = Box<dyn FnMut(&mut T) + Send>;

/// Generic bounded pool.
pub struct ObjectPool<T> {
    entries: Vec<PooledEntry<T>>,
    factory: Factory<T>,
    reset: Option<Reset<T>>,
    max_size: usize,
    /// Monotonic borrow counter.
    borrow_seq: u64,
    stats: PoolStats,
}

impl<T> ObjectPool<T> {
    /// Create a pool that builds instances with `factory`, holding at most
    /// `max_size` of them. A `max_size` of zero is treated as one.
    pub fn new(max_size: usize, factory: impl FnMut() -> T + Send + 'static) -> Self {
        Self {
            entries: Vec::new(),
            factory: Box::new(factory),
            reset: None,
            max_size: max_size.max(1),
            borrow_seq: 0,
            stats: PoolStats::default(),
        }
    }

    /// Run `reset` on every instance before it is handed out again.
    pub fn with_reset(mut self, reset: impl FnMut(&mut T) + Send + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }

    /// Borrow an instance.
    ///
    /// Prefers an inactive pooled instance, then constructs a new one while
    /// below `max_size`, and finally recycles the oldest outstanding borrow.
    pub fn get(&mut self) -> PoolHandle {
        if let Some(slot) = self.entries.iter().position(|e| !e.active) {
            self.stats.reused += 1;
            return self.activate(slot);
        }

        if self.entries.len() < self.max_size {
            let value = (self.factory)();
            let borrowed_at = self.next_seq();
            self.entries.push(PooledEntry {
                value,
                active: true,
                generation: 0,
                borrowed_at,
            });
            self.stats.created += 1;
            let slot = self.entries.len() - 1;
            return PoolHandle {
                slot: slot as u32,
                generation: 0,
            };
        }

        let slot = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.borrowed_at)
            .map_or(0, |(slot, _)| slot);
        self.stats.recycled += 1;
        tracing::trace!(slot, "pool exhausted, recycling oldest instance");
        self.activate(slot)
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.borrow_seq;
        self.borrow_seq += 1;
        seq
    }

    fn activate(&mut self, slot: usize) -> PoolHandle {
        let borrowed_at = self.next_seq();
        let entry = &mut self.entries[slot];
        entry.borrowed_at = borrowed_at;
        entry.generation = entry.generation.wrapping_add(1);
        entry.active = true;
        if let Some(reset) = self.reset.as_mut() {
            reset(&mut entry.value);
        }
        PoolHandle {
            slot: slot as u32,
            generation: entry.generation,
        }
    }

    /// Return a borrowed instance. Returns `false` for stale or already
    /// released handles.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        match self.entries.get_mut(handle.slot()) {
            Some(entry) if entry.generation == handle.generation && entry.active => {
                entry.active = false;
                true
            }
            _ => false,
        }
    }

    /// Access a borrowed instance. `None` once the slot was released or recycled.
    pub fn get_ref(&self, handle: PoolHandle) -> Option<&T> {
        self.entries
            .get(handle.slot())
            .filter(|e| e.active && e.generation == handle.generation)
            .map(|e| &e.value)
    }

    /// Mutable access to a borrowed instance.
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.entries
            .get_mut(handle.slot())
            .filter(|e| e.active && e.generation == handle.generation)
            .map(|e| &mut e.value)
    }

    /// Borrow an instance, run `f` on it, and release it.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let handle = self.get();
        let slot = handle.slot();
        let result = f(&mut self.entries[slot].value);
        self.release(handle);
        result
    }

    /// Number of instances currently constructed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of instances currently borrowed.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
