//! Registry-backed objects that outlive a single solver call.
//!
//! A [`Persistent`] pairs a registry key with the factory that can build the
//! object stored under it. Solvers construct a fresh `Persistent` on every
//! call; only the first one for a key actually runs the factory.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, info};

use crate::registry::ObjectRegistry;

/// Builds and refreshes one kind of persistent object.
pub trait PersistentFactory {
    type Object: Any + Send + Sync;
    type Error;

    /// Build the object. Called at most once per registry key.
    fn init(&self) -> Result<Arc<Self::Object>, Self::Error>;

    /// Refresh an object taken from the registry.
    fn update(&self, object: &Arc<Self::Object>);
}

/// Handle to the object stored under `key` in a registry.
pub struct Persistent<F: PersistentFactory> {
    key: String,
    registry: Arc<ObjectRegistry>,
    factory: F,
    verbose: i64,
}

impl<F: PersistentFactory> Persistent<F> {
    /// Bind `factory` to `key`.
    ///
    /// With `create_on_demand` the object is built on the first call to
    /// [`get_persistent_object`](Self::get_persistent_object); otherwise it
    /// is built (or fetched) right away and factory errors surface here.
    pub fn new(
        key: String,
        registry: Arc<ObjectRegistry>,
        factory: F,
        create_on_demand: bool,
        verbose: i64,
    ) -> Result<Self, F::Error> {
        let persistent = Self {
            key,
            registry,
            factory,
            verbose,
        };
        if !create_on_demand {
            persistent.get_persistent_object()?;
        }
        Ok(persistent)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Whether the object has been built already.
    pub fn is_stored(&self) -> bool {
        self.registry.contains::<F::Object>(&self.key)
    }

    /// Stored object, built on first use and refreshed on later ones.
    pub fn get_persistent_object(&self) -> Result<Arc<F::Object>, F::Error> {
        let (object, created) = self
            .registry
            .get_or_create(&self.key, || self.factory.init())?;
        if created {
            if self.verbose > 0 {
                info!(key = %self.key, "created persistent object");
            } else {
                debug!(key = %self.key, "created persistent object");
            }
        } else {
            debug!(key = %self.key, "reusing persistent object");
            self.factory.update(&object);
        }
        Ok(object)
    }
}
