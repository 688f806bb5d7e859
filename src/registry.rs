//! Reference-counted sharing of one instance per `(component, scope)`.
//!
//! Several observers of the same buffer (one per view, say) want the same
//! tagger. The first `acquire` creates it through a factory, later ones share
//! it, and the release that brings the count back to zero tears it down.
//!
//! Acquire and release are expected on the main context; the map is a
//! `DashMap` so a registry can still be shared behind an `Arc`.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{LockResultExt, TaggerError, TaggerResult};
use crate::text::BufferId;

/// Logging target for the registry.
const LOG_TARGET: &str = "async_tagger::registry";

/// Explicit teardown, run when the last reference is released.
pub trait Dispose {
    fn dispose(&mut self);
}

/// Names the kind of component stored (e.g. "search-highlight").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey(&'static str);

impl ComponentKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Identifies the object instances are scoped to, usually a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<BufferId> for ScopeId {
    fn from(buffer: BufferId) -> Self {
        Self(buffer.get())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

type RegistryKey = (ComponentKey, ScopeId);

struct RegistryEntry {
    /// An `Arc<Mutex<T>>` with its type erased.
    instance: Arc<dyn Any + Send + Sync>,
    count: usize,
    teardown: Box<dyn Fn() + Send + Sync>,
}

/// One acquisition of a shared instance.
///
/// Not `Clone`: every handle stands for exactly one acquisition and is
/// given back with [`ScopeRegistry::release`].
pub struct SharedHandle<T> {
    key: ComponentKey,
    scope: ScopeId,
    instance: Arc<Mutex<T>>,
}

impl<T> SharedHandle<T> {
    pub fn key(&self) -> ComponentKey {
        self.key
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn lock(&self) -> TaggerResult<MutexGuard<'_, T>> {
        self.instance.lock().recover_poison("SharedHandle::lock")
    }

    /// Run `f` with exclusive access to the shared instance.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> TaggerResult<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &SharedHandle<T>) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl<T> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish()
    }
}

fn describe(key: &RegistryKey) -> String {
    format!("{}/{}", key.0, key.1)
}

/// Registry of reference-counted instances keyed by `(ComponentKey, ScopeId)`.
#[derive(Default)]
pub struct ScopeRegistry {
    entries: DashMap<RegistryKey, RegistryEntry>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the instance for `(key, scope)`, creating it with `factory` on first use.
    ///
    /// A failing factory stores nothing. The factory must not use this registry.
    pub fn acquire<T, F>(
        &self,
        key: ComponentKey,
        scope: ScopeId,
        factory: F,
    ) -> TaggerResult<SharedHandle<T>>
    where
        T: Dispose + Send + 'static,
        F: FnOnce() -> TaggerResult<T>,
    {
        let registry_key = (key, scope);
        match self.entries.entry(registry_key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let instance = entry
                    .instance
                    .clone()
                    .downcast::<Mutex<T>>()
                    .map_err(|_| TaggerError::scope_type_mismatch(describe(&registry_key)))?;
                entry.count += 1;
                log::trace!(
                    target: LOG_TARGET,
                    "Acquired {} (count {})",
                    describe(&registry_key),
                    entry.count
                );
                Ok(SharedHandle {
                    key,
                    scope,
                    instance,
                })
            }
            Entry::Vacant(vacant) => {
                let instance = Arc::new(Mutex::new(factory()?));
                let for_teardown = instance.clone();
                vacant.insert(RegistryEntry {
                    instance: instance.clone(),
                    count: 1,
                    teardown: Box::new(move || {
                        if let Ok(mut guard) =
                            for_teardown.lock().recover_poison("ScopeRegistry::teardown")
                        {
                            guard.dispose();
                        }
                    }),
                });
                log::debug!(target: LOG_TARGET, "Created {}", describe(&registry_key));
                Ok(SharedHandle {
                    key,
                    scope,
                    instance,
                })
            }
        }
    }

    /// Give back one acquisition.
    ///
    /// A handle to an instance that was already torn down (by
    /// [`ScopeRegistry::dispose_scope`]) is rejected, even when the same key
    /// has been acquired again since.
    pub fn release<T>(&self, handle: SharedHandle<T>) -> TaggerResult<()> {
        let instance = Arc::as_ptr(&handle.instance).cast::<()>();
        self.release_matching(handle.key, handle.scope, |entry| {
            Arc::as_ptr(&entry.instance).cast::<()>() == instance
        })
    }

    /// Give back one acquisition of `(key, scope)`.
    ///
    /// Releasing more often than acquired is a contract violation.
    pub fn release_key(&self, key: ComponentKey, scope: ScopeId) -> TaggerResult<()> {
        self.release_matching(key, scope, |_| true)
    }

    fn release_matching(
        &self,
        key: ComponentKey,
        scope: ScopeId,
        is_same_instance: impl Fn(&RegistryEntry) -> bool,
    ) -> TaggerResult<()> {
        let registry_key = (key, scope);
        let remaining = match self.entries.get_mut(&registry_key) {
            Some(mut entry) if is_same_instance(&*entry) => {
                entry.count -= 1;
                entry.count
            }
            Some(_) => {
                log::error!(
                    target: LOG_TARGET,
                    "Release of a torn-down instance of {}",
                    describe(&registry_key)
                );
                return Err(TaggerError::unbalanced_release(describe(&registry_key)));
            }
            None => {
                log::error!(
                    target: LOG_TARGET,
                    "Release of {} without matching acquire",
                    describe(&registry_key)
                );
                return Err(TaggerError::unbalanced_release(describe(&registry_key)));
            }
        };

        if remaining == 0
            && let Some((_, entry)) = self
                .entries
                .remove_if(&registry_key, |_, entry| entry.count == 0)
        {
            (entry.teardown)();
            log::debug!(target: LOG_TARGET, "Tore down {}", describe(&registry_key));
        }
        Ok(())
    }

    /// Tear down every instance of `scope` regardless of outstanding handles.
    ///
    /// Returns how many instances were torn down.
    pub fn dispose_scope(&self, scope: ScopeId) -> usize {
        let keys: Vec<RegistryKey> = self
            .entries
            .iter()
            .filter(|entry| entry.key().1 == scope)
            .map(|entry| *entry.key())
            .collect();

        let mut disposed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                (entry.teardown)();
                disposed += 1;
            }
        }
        if disposed > 0 {
            log::debug!(
                target: LOG_TARGET,
                "Disposed {} instance(s) of {}",
                disposed,
                scope
            );
        }
        disposed
    }

    /// Live acquisitions of `(key, scope)`.
    pub fn ref_count(&self, key: ComponentKey, scope: ScopeId) -> usize {
        self.entries
            .get(&(key, scope))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
