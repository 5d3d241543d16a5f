//! Live call registry for one campaign run
//!
//! Holds every [`DialResult`] that is still in flight or inside its terminal
//! grace window. Lookups by provider call control id go through a secondary
//! index so webhook handling does not scan the map.
//!
//! Closures passed to [`CallRegistry::update`] run while a shard lock is
//! held; they must not call back into the registry.

use dashmap::DashMap;

use crate::types::{CallId, DialResult};

#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: DashMap<CallId, DialResult>,
    by_control_id: DashMap<String, CallId>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result, indexing its call control id when present
    pub fn insert(&self, result: DialResult) {
        if let Some(control_id) = &result.call_control_id {
            self.by_control_id.insert(control_id.clone(), result.call_id.clone());
        }
        self.calls.insert(result.call_id.clone(), result);
    }

    pub fn get(&self, call_id: &CallId) -> Option<DialResult> {
        self.calls.get(call_id).map(|entry| entry.value().clone())
    }

    pub fn call_id_for(&self, call_control_id: &str) -> Option<CallId> {
        self.by_control_id
            .get(call_control_id)
            .map(|entry| entry.value().clone())
    }

    /// Mutate a tracked call in place, returning the closure's result
    pub fn update<R>(&self, call_id: &CallId, f: impl FnOnce(&mut DialResult) -> R) -> Option<R> {
        self.calls.get_mut(call_id).map(|mut entry| f(entry.value_mut()))
    }

    pub fn remove(&self, call_id: &CallId) -> Option<DialResult> {
        let (_, result) = self.calls.remove(call_id)?;
        if let Some(control_id) = &result.call_control_id {
            self.by_control_id
                .remove_if(control_id, |_, indexed| indexed == call_id);
        }
        Some(result)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Phone numbers with a call still held in the registry
    pub fn phone_numbers(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|entry| entry.value().phone_number.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<DialResult> {
        let mut calls: Vec<DialResult> = self.calls.iter().map(|entry| entry.value().clone()).collect();
        calls.sort_by(|a, b| a.initiated_at.cmp(&b.initiated_at));
        calls
    }

    /// Answered calls not yet connected to an agent
    pub fn count_waiting(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| entry.value().is_waiting_for_agent())
            .count()
    }
}
