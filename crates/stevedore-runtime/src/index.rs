//! Name reservations and id prefix lookup.
//!
//! Both indices carry their own lock so they stay consistent on their own;
//! the registry additionally holds its lock around combined updates.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};

use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerId;

#[derive(Debug, Default)]
struct Reservations {
    by_name: HashMap<String, ContainerId>,
    by_id: HashMap<ContainerId, BTreeSet<String>>,
}

/// Unique human-readable names, each reserved for exactly one container.
#[derive(Debug, Default)]
pub struct NameIndex {
    inner: Mutex<Reservations>,
}

impl NameIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `name` for `id`. Reserving a name the id already holds is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NameTaken` if another container holds the name and a
    /// `Config` error for an empty name.
    pub fn reserve(&self, name: &str, id: &ContainerId) -> Result<()> {
        if name.is_empty() {
            return Err(StevedoreError::Config {
                message: "container name must not be empty".into(),
            });
        }

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(holder) = inner.by_name.get(name) {
            if holder == id {
                return Ok(());
            }
            return Err(StevedoreError::NameTaken {
                name: name.to_string(),
                holder: holder.to_string(),
            });
        }

        let _ = inner.by_name.insert(name.to_string(), id.clone());
        let _ = inner
            .by_id
            .entry(id.clone())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    /// Releases `name`.
    ///
    /// # Errors
    ///
    /// Returns `NameNotReserved` if nobody holds the name.
    pub fn release(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner
            .by_name
            .remove(name)
            .ok_or_else(|| StevedoreError::NameNotReserved {
                name: name.to_string(),
            })?;
        if let Some(names) = inner.by_id.get_mut(&id) {
            let _ = names.remove(name);
            if names.is_empty() {
                let _ = inner.by_id.remove(&id);
            }
        }
        Ok(())
    }

    /// Returns the id holding `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is free.
    pub fn get(&self, name: &str) -> Result<ContainerId> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| StevedoreError::NotFound {
                kind: "name",
                id: name.to_string(),
            })
    }

    /// Returns every name reserved for `id`, sorted.
    #[must_use]
    pub fn names_of(&self, id: &ContainerId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns whether `name` is currently free.
    #[must_use]
    pub fn is_free(&self, name: &str) -> bool {
        !self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .contains_key(name)
    }
}

/// Sorted set of full ids answering unique-prefix lookups.
#[derive(Debug, Default)]
pub struct IdIndex {
    ids: RwLock<Vec<ContainerId>>,
}

impl IdIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a full id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for an empty id, an id containing whitespace, or
    /// an id that is already indexed.
    pub fn add(&self, id: &ContainerId) -> Result<()> {
        let raw = id.as_str();
        let reason = if raw.is_empty() {
            Some("id is empty")
        } else if raw.chars().any(char::is_whitespace) {
            Some("id contains whitespace")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(invalid(id, reason));
        }

        let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        match ids.binary_search(id) {
            Ok(_) => Err(invalid(id, "id is already indexed")),
            Err(pos) => {
                ids.insert(pos, id.clone());
                Ok(())
            }
        }
    }

    /// Removes a full id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not indexed.
    pub fn delete(&self, id: &ContainerId) -> Result<()> {
        let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        let pos = ids.binary_search(id).map_err(|_| StevedoreError::NotFound {
            kind: "id",
            id: id.to_string(),
        })?;
        let _ = ids.remove(pos);
        Ok(())
    }

    /// Resolves a full id or a unique prefix of one.
    ///
    /// An id that equals `prefix` exactly wins even when it is also a
    /// prefix of other ids.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousPrefix` if several ids share the prefix and
    /// `NotFound` if none does or the prefix is empty.
    pub fn get(&self, prefix: &str) -> Result<ContainerId> {
        let not_found = || StevedoreError::NotFound {
            kind: "id",
            id: prefix.to_string(),
        };
        if prefix.is_empty() {
            return Err(not_found());
        }

        let ids = self.ids.read().unwrap_or_else(PoisonError::into_inner);
        let start = ids.partition_point(|id| id.as_str() < prefix);
        let mut matches = ids[start..]
            .iter()
            .take_while(|id| id.as_str().starts_with(prefix));

        let first = matches.next().ok_or_else(not_found)?;
        if first.as_str() == prefix || matches.next().is_none() {
            return Ok(first.clone());
        }
        Err(StevedoreError::AmbiguousPrefix {
            prefix: prefix.to_string(),
        })
    }

    /// Returns the number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn invalid(id: &ContainerId, reason: &'static str) -> StevedoreError {
    StevedoreError::InvalidId {
        id: id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn index_of(ids: &[&str]) -> IdIndex {
        let index = IdIndex::new();
        for id in ids {
            index.add(&ContainerId::new(*id)).expect("add");
        }
        index
    }

    #[test]
    fn reserve_rejects_second_holder() {
        let names = NameIndex::new();
        names.reserve("web", &ContainerId::new("a")).expect("first");
        let err = names.reserve("web", &ContainerId::new("b")).expect_err("taken");
        assert!(matches!(err, StevedoreError::NameTaken { ref holder, .. } if holder == "a"));
    }

    #[test]
    fn reserve_is_idempotent_for_the_holder() {
        let names = NameIndex::new();
        let id = ContainerId::new("a");
        names.reserve("web", &id).expect("first");
        names.reserve("web", &id).expect("again");
        assert_eq!(names.names_of(&id), vec!["web".to_string()]);
    }

    #[test]
    fn release_frees_the_name() {
        let names = NameIndex::new();
        names.reserve("web", &ContainerId::new("a")).expect("reserve");
        names.release("web").expect("release");
        assert!(names.is_free("web"));
        assert!(names.get("web").expect_err("gone").is_not_found());
        assert!(names.names_of(&ContainerId::new("a")).is_empty());
        names.reserve("web", &ContainerId::new("b")).expect("reusable");
    }

    #[test]
    fn release_of_free_name_is_an_error() {
        let names = NameIndex::new();
        let err = names.release("ghost").expect_err("not reserved");
        assert!(matches!(err, StevedoreError::NameNotReserved { .. }));
    }

    #[test]
    fn empty_name_is_rejected() {
        let names = NameIndex::new();
        assert!(names.reserve("", &ContainerId::new("a")).is_err());
    }

    #[test]
    fn concurrent_reserve_has_one_winner() {
        let names = Arc::new(NameIndex::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let names = Arc::clone(&names);
                std::thread::spawn(move || {
                    let id = ContainerId::new(format!("id{i}"));
                    names.reserve("shared", &id).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn prefix_lookup_resolves_unique_prefixes() {
        let index = index_of(&["abcd1234", "abcd5678"]);
        assert_eq!(index.get("abcd1").expect("unique"), ContainerId::new("abcd1234"));
        assert_eq!(index.get("abcd5678").expect("full"), ContainerId::new("abcd5678"));
    }

    #[test]
    fn shared_prefix_is_ambiguous() {
        let index = index_of(&["abcd1234", "abcd5678"]);
        let err = index.get("abcd").expect_err("ambiguous");
        assert!(matches!(err, StevedoreError::AmbiguousPrefix { ref prefix } if prefix == "abcd"));
    }

    #[test]
    fn unknown_and_empty_prefixes_are_not_found() {
        let index = index_of(&["abcd1234"]);
        assert!(index.get("ffff").expect_err("unknown").is_not_found());
        assert!(index.get("").expect_err("empty").is_not_found());
    }

    #[test]
    fn exact_match_wins_over_longer_ids() {
        let index = index_of(&["abc", "abcdef"]);
        assert_eq!(index.get("abc").expect("exact"), ContainerId::new("abc"));
        assert_eq!(index.get("abcd").expect("longer"), ContainerId::new("abcdef"));
    }

    #[test]
    fn add_validates_ids() {
        let index = IdIndex::new();
        assert!(matches!(
            index.add(&ContainerId::new("")),
            Err(StevedoreError::InvalidId { .. })
        ));
        assert!(matches!(
            index.add(&ContainerId::new("has space")),
            Err(StevedoreError::InvalidId { .. })
        ));
        index.add(&ContainerId::new("ok")).expect("add");
        assert!(matches!(
            index.add(&ContainerId::new("ok")),
            Err(StevedoreError::InvalidId { .. })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn delete_removes_from_lookup() {
        let index = index_of(&["abcd1234", "abcd5678"]);
        index.delete(&ContainerId::new("abcd5678")).expect("delete");
        assert_eq!(index.get("abcd").expect("now unique"), ContainerId::new("abcd1234"));
        assert!(index.delete(&ContainerId::new("abcd5678")).expect_err("twice").is_not_found());
    }
}
