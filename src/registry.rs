//! # Process-wide registries
//!
//! Every registry in this crate shares one shape: a map behind a
//! reader/writer lock, an atomic version counter bumped on every mutation,
//! and a snapshot cache readers rebuild exactly once per generation.
//! Writes are rare (initialisation and user-triggered registration); reads
//! dominate and hit the snapshot.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;

use crate::options::Options;

pub(crate) struct VersionedRegistry<K, V> {
    map: RwLock<HashMap<K, V>>,
    version: AtomicU64,
    snapshot: Mutex<(u64, Option<Arc<HashMap<K, V>>>)>,
}

impl<K, V> VersionedRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            snapshot: Mutex::new((0, None)),
        }
    }

    pub(crate) fn insert(&self, key: K, value: V) {
        let mut map = self.map.write().expect("registry lock poisoned");
        map.insert(key, value);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn remove(&self, key: &K) -> Option<V> {
        let mut map = self.map.write().expect("registry lock poisoned");
        let removed = map.remove(key);
        if removed.is_some() {
            self.version.fetch_add(1, Ordering::Release);
        }
        removed
    }

    /// The current generation's snapshot, rebuilt at most once per
    /// mutation.
    pub(crate) fn snapshot(&self) -> Arc<HashMap<K, V>> {
        let version = self.version.load(Ordering::Acquire);
        let mut cached = self.snapshot.lock().expect("snapshot lock poisoned");
        match &cached.1 {
            Some(map) if cached.0 == version => map.clone(),
            _ => {
                let map = Arc::new(self.map.read().expect("registry lock poisoned").clone());
                *cached = (version, Some(map.clone()));
                map
            }
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.snapshot().get(key).cloned()
    }
}

/// How a WITH COMPONENTS rule constrains one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

/// A named WITH COMPONENTS rule set: component name to required presence.
pub type WithComponentsRules = HashMap<String, Presence>;

type DefaultProducer = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

static DEFAULT_VALUES: Lazy<VersionedRegistry<String, DefaultProducer>> =
    Lazy::new(VersionedRegistry::new);

static WITH_COMPONENTS: Lazy<VersionedRegistry<String, Arc<WithComponentsRules>>> =
    Lazy::new(VersionedRegistry::new);

static OVERRIDE_OPTIONS: Lazy<VersionedRegistry<TypeId, Arc<Options>>> =
    Lazy::new(VersionedRegistry::new);

/// Registers a named DEFAULT value consulted by `default::NAME`
/// annotations. Names are case-folded.
pub fn register_default_value<T>(name: &str, value: T)
where
    T: Any + Clone + Send + Sync,
{
    DEFAULT_VALUES.insert(
        name.to_ascii_lowercase(),
        Arc::new(move || Box::new(value.clone()) as Box<dyn Any>),
    );
}

/// Removes a named DEFAULT value.
pub fn unregister_default_value(name: &str) {
    DEFAULT_VALUES.remove(&name.to_ascii_lowercase());
}

/// Produces a fresh copy of the named DEFAULT value, if registered.
pub fn default_value(name: &str) -> Option<Box<dyn Any>> {
    DEFAULT_VALUES
        .get(&name.to_ascii_lowercase())
        .map(|producer| producer())
}

/// Registers a named WITH COMPONENTS rule set.
pub fn register_with_components(name: &str, rules: WithComponentsRules) {
    WITH_COMPONENTS.insert(name.to_ascii_lowercase(), Arc::new(rules));
}

/// Removes a named WITH COMPONENTS rule set.
pub fn unregister_with_components(name: &str) {
    WITH_COMPONENTS.remove(&name.to_ascii_lowercase());
}

pub(crate) fn with_components_rules(name: &str) -> Option<Arc<WithComponentsRules>> {
    WITH_COMPONENTS.get(&name.to_ascii_lowercase())
}

/// Registers type-level options applied whenever `T` is encoded or decoded
/// without per-field options of its own.
pub fn register_override_options<T: Any>(options: Options) {
    OVERRIDE_OPTIONS.insert(TypeId::of::<T>(), Arc::new(options));
}

pub(crate) fn override_options(type_id: TypeId) -> Option<Arc<Options>> {
    OVERRIDE_OPTIONS.get(&type_id)
}
