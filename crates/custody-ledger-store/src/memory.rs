//! In-memory implementation of the LedgerStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use custody_ledger_core::{CustodyEvent, SubjectId};

use crate::error::{Result, StoreError};
use crate::traits::{is_successor, AppendResult, HeadRef, LedgerStore};

/// In-memory store implementation.
///
/// Each subject's chain sits behind its own RwLock. The outer map lock is
/// only held to find or create a subject entry, so appends to different
/// subjects never wait on each other.
pub struct MemoryStore {
    subjects: RwLock<HashMap<SubjectId, Arc<RwLock<SubjectChain>>>>,
}

#[derive(Default)]
struct SubjectChain {
    events: Vec<CustodyEvent>,
    archived: bool,
}

impl SubjectChain {
    fn head(&self) -> Option<HeadRef> {
        self.events.last().map(HeadRef::of)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
        }
    }

    fn chain(&self, subject_id: &SubjectId) -> Result<Option<Arc<RwLock<SubjectChain>>>> {
        let subjects = self.subjects.read()?;
        Ok(subjects.get(subject_id).cloned())
    }

    fn chain_or_create(&self, subject_id: &SubjectId) -> Result<Arc<RwLock<SubjectChain>>> {
        if let Some(chain) = self.chain(subject_id)? {
            return Ok(chain);
        }
        let mut subjects = self.subjects.write()?;
        Ok(subjects.entry(subject_id.clone()).or_default().clone())
    }

    /// Mutate a stored event in place, bypassing every append-only guard.
    ///
    /// Returns `false` if no event exists at that position.
    #[cfg(any(test, feature = "test-util"))]
    pub fn tamper_with<F>(&self, subject_id: &SubjectId, seq: u64, f: F) -> Result<bool>
    where
        F: FnOnce(&mut CustodyEvent),
    {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(false);
        };
        let mut chain = chain.write()?;
        match chain.events.get_mut(seq as usize) {
            Some(event) => {
                f(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append_event(&self, event: &CustodyEvent) -> Result<AppendResult> {
        let chain = self.chain_or_create(&event.subject_id)?;
        let mut chain = chain.write()?;

        if chain.archived {
            return Ok(AppendResult::Archived);
        }

        let head = chain.head();
        if !is_successor(head.as_ref(), event) {
            return Ok(AppendResult::Conflict { head });
        }

        chain.events.push(event.clone());
        Ok(AppendResult::Appended)
    }

    async fn get_event(&self, subject_id: &SubjectId, seq: u64) -> Result<Option<CustodyEvent>> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(None);
        };
        let chain = chain.read()?;
        Ok(chain.events.get(seq as usize).cloned())
    }

    async fn get_range(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<Vec<CustodyEvent>> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(Vec::new());
        };
        let chain = chain.read()?;
        Ok(chain
            .events
            .iter()
            .filter(|e| e.sequence_number >= start && e.sequence_number <= end)
            .cloned()
            .collect())
    }

    async fn get_head(&self, subject_id: &SubjectId) -> Result<Option<CustodyEvent>> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(None);
        };
        let chain = chain.read()?;
        Ok(chain.events.last().cloned())
    }

    async fn get_chain(&self, subject_id: &SubjectId) -> Result<Vec<CustodyEvent>> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(Vec::new());
        };
        let chain = chain.read()?;
        Ok(chain.events.clone())
    }

    async fn chain_len(&self, subject_id: &SubjectId) -> Result<u64> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(0);
        };
        let chain = chain.read()?;
        Ok(chain.events.len() as u64)
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        let entries: Vec<(SubjectId, Arc<RwLock<SubjectChain>>)> = {
            let subjects = self.subjects.read()?;
            subjects
                .iter()
                .map(|(id, chain)| (id.clone(), chain.clone()))
                .collect()
        };

        let mut ids = Vec::with_capacity(entries.len());
        for (id, chain) in entries {
            if !chain.read()?.events.is_empty() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn mark_archived(&self, subject_id: &SubjectId) -> Result<()> {
        let chain = self
            .chain(subject_id)?
            .ok_or_else(|| StoreError::NotFound(subject_id.to_string()))?;
        let mut chain = chain.write()?;
        if chain.events.is_empty() {
            return Err(StoreError::NotFound(subject_id.to_string()));
        }
        chain.archived = true;
        Ok(())
    }

    async fn is_archived(&self, subject_id: &SubjectId) -> Result<bool> {
        let Some(chain) = self.chain(subject_id)? else {
            return Ok(false);
        };
        let archived = chain.read()?.archived;
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_ledger_core::{Actor, EventBuilder, EventPayload, PreviousHash};

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn genesis(id: &str) -> CustodyEvent {
        EventBuilder::new(
            subject(id),
            EventPayload::SubjectCreated {
                reference: "ORD-1".into(),
                description: "test".into(),
            },
        )
        .actor(Actor::new("alice", "packer"))
        .location("DOCK-1")
        .seal()
    }

    fn next(prev: &CustodyEvent, n: u32) -> CustodyEvent {
        EventBuilder::new(
            prev.subject_id.clone(),
            EventPayload::ContentAdded {
                item_code: format!("SKU-{n}"),
                description: "widget".into(),
                quantity: n,
            },
        )
        .actor(Actor::new("alice", "packer"))
        .location("DOCK-1")
        .follows(prev)
        .seal()
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");

        assert_eq!(store.append_event(&g).await.unwrap(), AppendResult::Appended);

        let head = store.get_head(&g.subject_id).await.unwrap().unwrap();
        assert_eq!(head, g);
        assert_eq!(store.chain_len(&g.subject_id).await.unwrap(), 1);
        assert_eq!(store.get_event(&g.subject_id, 0).await.unwrap(), Some(g));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_empty() {
        let store = MemoryStore::new();
        let id = subject("NOPE");
        assert!(store.get_head(&id).await.unwrap().is_none());
        assert!(store.get_chain(&id).await.unwrap().is_empty());
        assert_eq!(store.chain_len(&id).await.unwrap(), 0);
        assert!(!store.is_archived(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_head_conflicts() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");
        store.append_event(&g).await.unwrap();

        let a = next(&g, 1);
        let b = next(&g, 2);
        assert_eq!(store.append_event(&a).await.unwrap(), AppendResult::Appended);
        assert_eq!(
            store.append_event(&b).await.unwrap(),
            AppendResult::Conflict {
                head: Some(HeadRef::of(&a))
            }
        );
        assert_eq!(store.chain_len(&g.subject_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_genesis_conflicts() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");
        store.append_event(&g).await.unwrap();

        let result = store.append_event(&genesis("PKG-1")).await.unwrap();
        assert!(matches!(result, AppendResult::Conflict { head: Some(_) }));
    }

    #[tokio::test]
    async fn test_non_genesis_on_empty_chain_conflicts() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");
        let orphan = next(&g, 1);

        assert_eq!(
            store.append_event(&orphan).await.unwrap(),
            AppendResult::Conflict { head: None }
        );
    }

    #[tokio::test]
    async fn test_get_range() {
        let store = MemoryStore::new();
        let mut prev = genesis("PKG-1");
        store.append_event(&prev).await.unwrap();
        for n in 1..5 {
            let e = next(&prev, n);
            store.append_event(&e).await.unwrap();
            prev = e;
        }

        let range = store.get_range(&prev.subject_id, 1, 3).await.unwrap();
        let seqs: Vec<u64> = range.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let store = MemoryStore::new();
        store.append_event(&genesis("PKG-B")).await.unwrap();
        store.append_event(&genesis("PKG-A")).await.unwrap();

        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects, vec![subject("PKG-A"), subject("PKG-B")]);
    }

    #[tokio::test]
    async fn test_archived_rejects_appends() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");
        store.append_event(&g).await.unwrap();
        store.mark_archived(&g.subject_id).await.unwrap();

        assert!(store.is_archived(&g.subject_id).await.unwrap());
        assert_eq!(
            store.append_event(&next(&g, 1)).await.unwrap(),
            AppendResult::Archived
        );
        assert_eq!(store.get_chain(&g.subject_id).await.unwrap(), vec![g]);
    }

    #[tokio::test]
    async fn test_archive_unknown_subject() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.mark_archived(&subject("GHOST")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tamper_hook() {
        let store = MemoryStore::new();
        let g = genesis("PKG-1");
        store.append_event(&g).await.unwrap();

        let touched = store
            .tamper_with(&g.subject_id, 0, |e| e.previous_hash = PreviousHash::Event(g.current_hash))
            .unwrap();
        assert!(touched);

        let stored = store.get_head(&g.subject_id).await.unwrap().unwrap();
        assert!(!stored.hash_matches());
    }
}
