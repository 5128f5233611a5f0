use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::database::Store;
use crate::types::Actor;

/// State that flows through one pipeline run: the input, who asked, where
/// data lives, and whatever earlier rules left behind for later ones.
pub struct ExecutionContext<D> {
    pub dto: D,
    pub actor: Actor,
    pub store: Arc<dyn Store>,
    pub pipeline: String,
    pub start_time: Instant,

    // Typed hand-off between rules and the execution step
    metadata: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl<D> ExecutionContext<D> {
    pub fn new(pipeline: impl Into<String>, actor: Actor, store: Arc<dyn Store>, dto: D) -> Self {
        Self {
            dto,
            actor,
            store,
            pipeline: pipeline.into(),
            start_time: Instant::now(),
            metadata: HashMap::new(),
        }
    }

    /// Store typed metadata, replacing any previous value of the same type
    pub fn set_metadata<T: Send + Sync + 'static>(&mut self, data: T) {
        self.metadata.insert(TypeId::of::<T>(), Box::new(data));
    }

    pub fn get_metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_metadata_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.metadata
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Remove and return typed metadata
    pub fn take_metadata<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.metadata
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_metadata<T: Send + Sync + 'static>(&self) -> bool {
        self.metadata.contains_key(&TypeId::of::<T>())
    }
}
