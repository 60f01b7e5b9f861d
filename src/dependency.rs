//! Injected dependencies.
//!
//! Values are registered once while the application is built, either globally or
//! for one router, and are read-only afterwards. Each handler only sees the
//! subset whose names match one of its declared parameters.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Type-erased dependency value. Handlers downcast it back to the concrete type.
pub type Dependency = Arc<dyn Any + Send + Sync>;

static NEXT_ROUTER_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a router, used to scope router-level dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId(u32);

impl RouterId {
    /// The top-level application router.
    pub const ROOT: RouterId = RouterId(0);

    /// Allocate a fresh id for a sub-router.
    #[must_use]
    pub fn next() -> Self {
        RouterId(NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A flat `name → value` view of dependencies.
#[derive(Clone, Default)]
pub struct Dependencies {
    entries: HashMap<String, Dependency>,
}

impl Dependencies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.entries.insert(name.into(), Arc::new(value));
    }

    /// Insert an already shared value.
    pub fn insert_shared(&mut self, name: impl Into<String>, value: Dependency) {
        self.entries.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.get(name)
    }

    /// Fetch a dependency and downcast it to `T`.
    #[must_use]
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = Arc::clone(self.entries.get(name)?);
        value.downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Keep only the entries whose key equals one of `names`.
    #[must_use]
    pub fn subset<'a, I>(&self, names: I) -> Dependencies
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = names
            .into_iter()
            .filter_map(|name| {
                self.entries
                    .get(name)
                    .map(|v| (name.to_string(), Arc::clone(v)))
            })
            .collect();
        Dependencies { entries }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert every entry of `other` whose key is absent here.
    fn fill_from(&mut self, other: &Dependencies) {
        for (name, value) in &other.entries {
            self.entries
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(value));
        }
    }

    /// Insert every entry of `other`, replacing existing keys.
    fn overlay(&mut self, other: &Dependencies) {
        for (name, value) in &other.entries {
            self.entries.insert(name.clone(), Arc::clone(value));
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

/// Global and router-scoped dependency registry.
#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    global: Dependencies,
    routers: HashMap<RouterId, Dependencies>,
}

impl DependencyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `value` available to every route.
    pub fn add_global<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.global.insert(name, value);
    }

    /// Make `value` available to the routes of one router.
    pub fn add_router<T: Any + Send + Sync>(
        &mut self,
        router: RouterId,
        name: impl Into<String>,
        value: T,
    ) {
        self.routers.entry(router).or_default().insert(name, value);
    }

    #[must_use]
    pub fn global(&self) -> &Dependencies {
        &self.global
    }

    /// Router-scoped entries only; empty when the router registered none.
    #[must_use]
    pub fn router(&self, router: RouterId) -> Dependencies {
        self.routers.get(&router).cloned().unwrap_or_default()
    }

    /// Global entries plus the router's entries. Router entries win on conflict.
    #[must_use]
    pub fn for_router(&self, router: RouterId) -> Dependencies {
        let mut view = self.global.clone();
        if let Some(scoped) = self.routers.get(&router) {
            view.overlay(scoped);
        }
        view
    }

    /// Copy every entry into `target` unless `target` already has that key.
    ///
    /// Entries already in `target` are never overwritten, so merging twice has the
    /// same effect as merging once.
    pub fn merge_into(&self, target: &mut DependencyMap) {
        target.global.fill_from(&self.global);
        for (router, scoped) in &self.routers {
            target.routers.entry(*router).or_default().fill_from(scoped);
        }
    }

    /// Subset of a router's view that a consumer declaring `param_names` receives.
    #[must_use]
    pub fn consumed_by<'a, I>(&self, router: RouterId, param_names: I) -> Dependencies
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.for_router(router).subset(param_names)
    }
}
