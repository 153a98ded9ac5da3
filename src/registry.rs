//! # Layer 2: Discovery Registry
//!
//! Process-wide association from a subject's identity to its most recently
//! registered [`Composition`]. The registry stores compositions verbatim and
//! never inspects them.
//!
//! Two tables, one per kind of identity:
//! - **Value subjects** (`register_value`): keyed by the subject value itself,
//!   held strongly.
//! - **Shared subjects** (`register_shared`): keyed by the address of an `Arc`,
//!   holding only a `Weak` to the subject. An entry counts as gone once the
//!   subject is unreachable except through the registered composition.
//!
//! A registered composition that holds its own subject keeps that subject
//! allocated until the entry is swept. Sweeps happen in [`Registry::prune`],
//! [`Registry::len`], [`Registry::remove_shared`], and in `register_shared`
//! whenever the shared table has doubled since the last sweep. A stale slot
//! met by `try_get_shared` is dropped on the spot.
//!
//! Both tables sit behind `parking_lot::RwLock`; lookups take a shared lock.

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::Hash;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::primitives::value::{self, AnyValue};
use crate::store::{Composition, Subject};

type ErasedComposition = Arc<dyn Any + Send + Sync>;

/// Smallest shared table size that triggers a sweep on registration.
const MIN_SWEEP_AT: usize = 8;

/// Identity of a shared subject: its type and heap address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct SharedKey {
    ty: TypeId,
    addr: usize,
}

struct SharedSlot {
    subject: Weak<dyn Any + Send + Sync>,
    composition: ErasedComposition,
    /// The composition itself holds one strong reference to the subject.
    holds_subject: bool,
}

impl SharedSlot {
    fn is_live(&self) -> bool {
        let strong = self.subject.strong_count();
        if !self.holds_subject {
            return strong > 0;
        }
        // Reachable from outside, or someone outside holds the composition.
        strong > 1 || (strong == 1 && Arc::strong_count(&self.composition) > 1)
    }

    /// Live and still pointing at `addr`, not at a reused address.
    fn is_live_at(&self, addr: *const ()) -> bool {
        self.is_live()
            && self
                .subject
                .upgrade()
                .is_some_and(|live| core::ptr::eq(Arc::as_ptr(&live) as *const (), addr))
    }
}

struct SharedTable {
    slots: FxHashMap<SharedKey, SharedSlot>,
    /// Registration sweeps once `slots` reaches this size.
    sweep_at: usize,
}

impl Default for SharedTable {
    fn default() -> Self {
        Self {
            slots: FxHashMap::default(),
            sweep_at: MIN_SWEEP_AT,
        }
    }
}

impl SharedTable {
    fn sweep(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live());
        self.sweep_at = (self.slots.len() * 2).max(MIN_SWEEP_AT);
        before - self.slots.len()
    }
}

/// Concurrent subject -> composition table.
#[derive(Default)]
pub struct Registry {
    values: RwLock<FxHashMap<AnyValue, ErasedComposition>>,
    shared: RwLock<SharedTable>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-wide registry.
#[inline]
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Value subjects
    // =========================================================================

    /// Associates `composition` with the value `subject`, replacing any previous one.
    pub fn register_value<K, S>(&self, subject: K, composition: Arc<Composition<S>>)
    where
        K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
        S: Subject,
    {
        tracing::debug!(subject = ?subject, "registering value subject");
        self.values.write().insert(AnyValue::new(subject), composition);
    }

    /// Looks `subject` up by reference; the key is neither cloned nor boxed.
    pub fn try_get_value<K, S>(&self, subject: &K) -> Option<Arc<Composition<S>>>
    where
        K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
        S: Subject,
    {
        let erased = self.values.read().get(value::borrowed(subject))?.clone();
        erased.downcast::<Composition<S>>().ok()
    }

    /// Returns whether an entry was removed.
    pub fn remove_value<K>(&self, subject: &K) -> bool
    where
        K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        let removed = self.values.write().remove(value::borrowed(subject)).is_some();
        tracing::debug!(subject = ?subject, removed, "removing value subject");
        removed
    }

    // =========================================================================
    // Shared subjects
    // =========================================================================

    /// Associates `composition` with the allocation behind `subject`.
    ///
    /// The registry keeps only a weak reference to the subject. If the
    /// composition holds the subject itself, the subject is freed at the first
    /// sweep after its last outside handle is dropped.
    pub fn register_shared<T, S>(&self, subject: &Arc<T>, composition: Arc<Composition<S>>)
    where
        T: Send + Sync + 'static,
        S: Subject,
    {
        let holds_subject = composition_holds(&composition, subject);
        let erased_subject: Arc<dyn Any + Send + Sync> = subject.clone();
        let slot = SharedSlot {
            subject: Arc::downgrade(&erased_subject),
            composition,
            holds_subject,
        };
        let mut shared = self.shared.write();
        let pruned = if shared.slots.len() >= shared.sweep_at {
            shared.sweep()
        } else {
            0
        };
        shared.slots.insert(shared_key(subject), slot);
        tracing::debug!(subject = core::any::type_name::<T>(), pruned, "registering shared subject");
    }

    pub fn try_get_shared<T, S>(&self, subject: &Arc<T>) -> Option<Arc<Composition<S>>>
    where
        T: Send + Sync + 'static,
        S: Subject,
    {
        let key = shared_key(subject);
        let addr = Arc::as_ptr(subject) as *const ();
        let erased = {
            let shared = self.shared.read();
            let slot = shared.slots.get(&key)?;
            if slot.is_live_at(addr) {
                Some(slot.composition.clone())
            } else {
                None
            }
        };
        match erased {
            Some(erased) => erased.downcast::<Composition<S>>().ok(),
            None => {
                let mut shared = self.shared.write();
                if shared.slots.get(&key).is_some_and(|slot| !slot.is_live_at(addr)) {
                    shared.slots.remove(&key);
                    tracing::debug!(subject = core::any::type_name::<T>(), "dropped stale shared slot");
                }
                None
            }
        }
    }

    /// Returns whether an entry was removed. Also sweeps dead entries.
    pub fn remove_shared<T: Send + Sync + 'static>(&self, subject: &Arc<T>) -> bool {
        let mut shared = self.shared.write();
        let removed = shared.slots.remove(&shared_key(subject)).is_some();
        let pruned = shared.sweep();
        tracing::debug!(subject = core::any::type_name::<T>(), removed, pruned, "removing shared subject");
        removed
    }

    /// Drops shared entries whose subject is gone. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let pruned = self.shared.write().sweep();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned shared subjects");
        }
        pruned
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Number of live entries across both tables. Sweeps the shared table.
    pub fn len(&self) -> usize {
        let values = self.values.read().len();
        let mut shared = self.shared.write();
        let pruned = shared.sweep();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned shared subjects");
        }
        values + shared.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.values.write().clear();
        *self.shared.write() = SharedTable::default();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("values", &self.values.read().len())
            .field("shared", &self.shared.read().slots.len())
            .finish()
    }
}

fn shared_key<T: 'static>(subject: &Arc<T>) -> SharedKey {
    SharedKey {
        ty: TypeId::of::<T>(),
        addr: Arc::as_ptr(subject) as *const () as usize,
    }
}

/// Whether `composition` keeps `subject` alive, either as its own subject
/// allocation (`S = T`) or as the subject value (`S = Arc<T>`).
fn composition_holds<S: Subject, T: 'static>(composition: &Composition<S>, subject: &Arc<T>) -> bool {
    let addr = Arc::as_ptr(subject) as *const ();
    if core::ptr::eq(Arc::as_ptr(composition.subject_arc()) as *const (), addr) {
        return true;
    }
    (composition.subject() as &dyn Any)
        .downcast_ref::<Arc<T>>()
        .is_some_and(|held| Arc::ptr_eq(held, subject))
}
