//! Free lists for high-frequency events.
//!
//! Pools are owned by whoever creates them, usually one recorder session.
//! A pool never refuses: when it is empty a fresh instance is created, and
//! released instances beyond the capacity are dropped.

use std::collections::HashMap;
use std::io::Read;

use parking_lot::Mutex;

use super::strategy::ThreadsInfo;
use super::{Event, EventTag, ProtocolError};

/// Something that can be reset before going back to a pool.
pub trait Poolable {
    fn clear(&mut self);
}

impl Poolable for Event {
    fn clear(&mut self) {
        Event::clear(self)
    }
}

impl Poolable for ThreadsInfo {
    fn clear(&mut self) {
        ThreadsInfo::clear(self)
    }
}

pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
    create: fn() -> T,
}

impl<T: Poolable> ObjectPool<T> {
    /// A capacity of 0 keeps every released instance.
    pub fn new(capacity: usize, create: fn() -> T) -> Self {
        ObjectPool { free: Mutex::new(Vec::new()), capacity, create }
    }

    pub fn get(&self) -> T {
        let pooled = self.free.lock().pop();
        pooled.unwrap_or_else(self.create)
    }

    pub fn release(&self, mut item: T) {
        item.clear();
        let mut free = self.free.lock();
        if self.capacity == 0 || free.len() < self.capacity {
            free.push(item);
        }
    }

    /// Number of idle instances.
    pub fn size(&self) -> usize {
        self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ObjectPool<ThreadsInfo> {
    pub fn threads_info() -> Self {
        ObjectPool::new(EventPools::DEFAULT_CAPACITY, ThreadsInfo::default)
    }
}

/// One pool per pooled event kind.
pub struct EventPools {
    pools: HashMap<EventTag, ObjectPool<Event>>,
}

impl Default for EventPools {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPools {
    pub const DEFAULT_CAPACITY: usize = 500;
    pub const IO_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        let mut pools = HashMap::new();
        pools.insert(EventTag::Enter, ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::Enter)));
        pools.insert(EventTag::Exit, ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::Exit)));
        pools.insert(
            EventTag::MemoryAllocated,
            ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::MemoryAllocated)),
        );
        pools.insert(
            EventTag::MemoryFreedByRecId,
            ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::MemoryFreedByRecId)),
        );
        pools.insert(
            EventTag::AssignToAll,
            ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::AssignToAll)),
        );
        pools.insert(
            EventTag::ClearTemporaryData,
            ObjectPool::new(Self::DEFAULT_CAPACITY, || Event::for_tag(EventTag::ClearTemporaryData)),
        );
        pools.insert(EventTag::Io, ObjectPool::new(Self::IO_CAPACITY, || Event::for_tag(EventTag::Io)));
        EventPools { pools }
    }

    /// An empty event of kind `tag`, taken from its pool if there is one.
    pub fn obtain(&self, tag: EventTag) -> Event {
        match self.pools.get(&tag) {
            Some(pool) => pool.get(),
            None => Event::for_tag(tag),
        }
    }

    /// Clears `event` and returns it to its pool. Unpooled kinds are dropped.
    pub fn release(&self, event: Event) {
        if let Some(pool) = self.pools.get(&event.tag()) {
            pool.release(event);
        }
    }

    /// Reads the body of a `tag` event into a pooled instance.
    pub fn read<R: Read + ?Sized>(&self, tag: EventTag, input: &mut R) -> Result<Event, ProtocolError> {
        let mut event = self.obtain(tag);
        if let Err(e) = event.read(input) {
            self.release(event);
            return Err(e);
        }
        Ok(event)
    }

    pub fn idle(&self, tag: EventTag) -> usize {
        self.pools.get(&tag).map_or(0, ObjectPool::size)
    }
}
