// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Worker;
use crate::error::EntryPointError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The body of a worker process.
///
/// `run` is driven until it returns or the supervisor aborts the worker. A
/// soft shutdown only fires [`Worker::shutdown_token`]; the entry point
/// decides when to return.
#[async_trait]
pub trait EntryPoint: Send {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError>;
}

type Factory = Box<dyn Fn() -> Box<dyn EntryPoint> + Send + Sync>;

/// Entry points by name.
///
/// The supervisor checks group entry points against it when a group is
/// described; a worker instantiates its group's entry point from it.
#[derive(Default)]
pub struct EntryPointRegistry {
    factories: BTreeMap<String, Factory>,
}

impl EntryPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register<F, E>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: EntryPoint + 'static,
    {
        self.factories
            .insert(name.into(), Box::new(move || Box::new(factory())));
        self
    }

    pub fn with<F, E>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: EntryPoint + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn EntryPoint>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
