//! Type tags for inline stack slots
//!
//! Inline slots on the [`Stack`](super::stack::Stack) carry a 4-byte type tag
//! in their header. Tags are small integers handed out on first use of each
//! concrete type and never reused, so a tag identifies one type for the
//! lifetime of the process.
//!
//! Lookups hit a thread-local cache first. Misses fall through to a global
//! table so a constant pool built on one thread reads back correctly on
//! another (see the `parallel` module).

use ahash::RandomState;
use hashbrown::HashMap;
use std::any::TypeId;
use std::cell::RefCell;
use std::sync::{Mutex, OnceLock};

/// Identifier stored in the header of every inline stack slot
pub type TypeTag = u32;

/// Global tag table shared by all threads
struct Registry {
    tags: HashMap<TypeId, TypeTag, RandomState>,
    next: TypeTag,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(Registry {
            tags: HashMap::with_hasher(RandomState::new()),
            next: 1,
        })
    })
}

thread_local! {
    /// Thread-local view of the global table
    static TAG_CACHE: RefCell<HashMap<TypeId, TypeTag, RandomState>> =
        RefCell::new(HashMap::with_hasher(RandomState::new()));
}

/// Get the tag for type `A`, registering it on first use
#[inline]
pub fn type_tag<A: 'static>() -> TypeTag {
    let id = TypeId::of::<A>();
    TAG_CACHE.with(|cache| {
        if let Some(tag) = cache.borrow().get(&id) {
            return *tag;
        }

        let tag = {
            // A poisoned lock still holds a consistent table: inserts are
            // single statements.
            let mut registry = match registry().lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match registry.tags.get(&id) {
                Some(tag) => *tag,
                None => {
                    let tag = registry.next;
                    registry.next += 1;
                    registry.tags.insert(id, tag);
                    tag
                }
            }
        };

        cache.borrow_mut().insert(id, tag);
        tag
    })
}

/// Number of types registered so far across all threads
#[cfg(test)]
fn registered_types() -> usize {
    match registry().lock() {
        Ok(guard) => guard.tags.len(),
        Err(poisoned) => poisoned.into_inner().tags.len(),
    }
}
