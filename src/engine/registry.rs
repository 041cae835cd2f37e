//! Optional name registry for running engines.
//!
//! Engines started with a `name` option are discoverable through
//! `Engine::lookup` until their runtime exits. Registration is global to
//! the process; a second engine claiming a live name fails startup.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::engine::Engine;
use crate::error::ScrapexError;

static REGISTRY: Lazy<DashMap<String, Engine>> = Lazy::new(DashMap::new);

pub(crate) fn register(name: &str, engine: Engine) -> Result<(), ScrapexError> {
    match REGISTRY.entry(name.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            Err(ScrapexError::AlreadyRegistered(name.to_string()))
        }
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            slot.insert(engine);
            debug!(name, "engine registered");
            Ok(())
        }
    }
}

pub(crate) fn deregister(name: &str) {
    if REGISTRY.remove(name).is_some() {
        debug!(name, "engine deregistered");
    }
}

pub(crate) fn lookup(name: &str) -> Option<Engine> {
    REGISTRY.get(name).map(|entry| entry.value().clone())
}
