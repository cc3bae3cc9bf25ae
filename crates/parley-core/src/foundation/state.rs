//! Turn-scoped named values.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BotError, BotResult};

type StateValue = Arc<dyn Any + Send + Sync>;

/// A string-keyed bag of values that lives for exactly one turn.
///
/// Values are stored behind `Arc`, so reads hand out cheap shared handles
/// and a value may be observed by several middleware in the same turn.
#[derive(Default)]
pub struct TurnState {
    values: Mutex<HashMap<String, StateValue>>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches a value for the rest of the turn, replacing any previous value.
    ///
    /// Fails with [`BotError::InvalidKey`] if `key` is empty.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> BotResult<()> {
        let key = key.into();
        check_key(&key)?;
        self.values.lock().insert(key, Arc::new(value));
        Ok(())
    }

    /// Reads a value previously stored with [`set`](Self::set).
    ///
    /// Fails with [`BotError::KeyNotFound`] if the key was never set and with
    /// [`BotError::TypeMismatch`] if it holds another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> BotResult<Arc<T>> {
        check_key(key)?;
        let value = self
            .values
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BotError::KeyNotFound(key.to_string()))?;

        value.downcast::<T>().map_err(|_| BotError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Returns `true` if [`set`](Self::set) was called for `key`. Never fails.
    pub fn has(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    /// Removes a value, returning `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.values.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

fn check_key(key: &str) -> BotResult<()> {
    if key.is_empty() {
        return Err(BotError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.lock();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        f.debug_struct("TurnState").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_fails() {
        let state = TurnState::new();
        assert!(matches!(
            state.get::<String>("missing"),
            Err(BotError::KeyNotFound(key)) if key == "missing"
        ));
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let state = TurnState::new();
        state.set("count", 3usize).unwrap();

        assert!(state.has("count"));
        assert_eq!(*state.get::<usize>("count").unwrap(), 3);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let state = TurnState::new();
        assert!(matches!(state.set("", 1u8), Err(BotError::InvalidKey(_))));
        assert!(matches!(state.get::<u8>(""), Err(BotError::InvalidKey(_))));
        assert!(!state.has(""));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let state = TurnState::new();
        state.set("name", "parley".to_string()).unwrap();

        let err = state.get::<u32>("name").unwrap_err();
        assert!(matches!(err, BotError::TypeMismatch { ref key, .. } if key == "name"));
    }

    #[test]
    fn test_has_never_fails_and_remove_clears() {
        let state = TurnState::new();
        assert!(!state.has("x"));
        state.set("x", ()).unwrap();
        assert!(state.remove("x"));
        assert!(!state.has("x"));
        assert!(state.is_empty());
    }
}
