//! In-process store with Vault's path semantics.
//!
//! Writes outside a registered mount fail the way Vault does ("no handler
//! for route"); list and read of missing paths are absent. Failures and the
//! list-then-read race can be injected for exercising callers.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::{clean_path, MountInfo, MountInput, StoreClient};
use crate::error::{Result, WireyError};
use crate::peer::Fields;

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListMounts,
    Mount,
    Write,
    List,
    Read,
}

#[derive(Default)]
struct Inner {
    mounts: HashMap<String, MountInfo>,
    records: BTreeMap<String, Fields>,
    mount_calls: usize,
    failures: HashMap<Operation, VecDeque<(u16, String)>>,
    /// Record paths deleted right after the next listing that returns them.
    vanishing: HashSet<String>,
}

/// Thread-safe shared store. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of mount registrations attempted so far.
    pub fn mount_calls(&self) -> usize {
        self.inner().mount_calls
    }

    pub fn record_count(&self) -> usize {
        self.inner().records.len()
    }

    /// Store raw fields at `path`, bypassing mount checks.
    pub fn insert_raw(&self, path: &str, fields: Fields) {
        self.inner().records.insert(clean_path(path), fields);
    }

    /// Make the next call of `op` fail with `status` and `message`.
    pub fn inject_failure(&self, op: Operation, status: u16, message: &str) {
        self.inner()
            .failures
            .entry(op)
            .or_default()
            .push_back((status, message.to_string()));
    }

    /// Delete the record at `path` as soon as a listing has returned it,
    /// reproducing a concurrent removal between list and read.
    pub fn vanish_after_list(&self, path: &str) {
        self.inner().vanishing.insert(clean_path(path));
    }

    fn take_failure(inner: &mut Inner, op: Operation) -> Result<()> {
        match inner.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some((status, message)) => Err(WireyError::Store {
                status,
                errors: vec![message],
            }),
            None => Ok(()),
        }
    }
}

fn mount_of(inner: &Inner, path: &str) -> Option<String> {
    let first = path.split('/').next()?;
    let key = format!("{first}/");
    inner.mounts.contains_key(&key).then_some(key)
}

#[async_trait::async_trait]
impl StoreClient for MemoryStore {
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>> {
        let mut inner = self.inner();
        Self::take_failure(&mut inner, Operation::ListMounts)?;
        Ok(inner.mounts.clone())
    }

    async fn mount(&self, path: &str, input: &MountInput) -> Result<()> {
        let mut inner = self.inner();
        inner.mount_calls += 1;
        Self::take_failure(&mut inner, Operation::Mount)?;
        let key = format!("{}/", clean_path(path));
        if inner.mounts.contains_key(&key) {
            return Err(WireyError::Store {
                status: 400,
                errors: vec![format!("path is already in use at {key}")],
            });
        }
        inner.mounts.insert(key, MountInfo::from(input));
        Ok(())
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<Option<Fields>> {
        let mut inner = self.inner();
        Self::take_failure(&mut inner, Operation::Write)?;
        let path = clean_path(path);
        if mount_of(&inner, &path).is_none() {
            return Err(WireyError::Store {
                status: 404,
                errors: vec![format!("no handler for route \"{path}\"")],
            });
        }
        inner.records.insert(path, fields);
        Ok(None)
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let mut inner = self.inner();
        Self::take_failure(&mut inner, Operation::List)?;
        let prefix = format!("{}/", clean_path(path));

        let mut children: Vec<String> = Vec::new();
        let mut listed: Vec<String> = Vec::new();
        for key in inner.records.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let child = match rest.find('/') {
                Some(i) => &rest[..=i],
                None => rest,
            };
            if children.last().map(String::as_str) != Some(child) {
                children.push(child.to_string());
            }
            listed.push(key.clone());
        }

        for key in listed {
            if inner.vanishing.remove(&key) {
                inner.records.remove(&key);
            }
        }

        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(children))
    }

    async fn read(&self, path: &str) -> Result<Option<Fields>> {
        let mut inner = self.inner();
        Self::take_failure(&mut inner, Operation::Read)?;
        Ok(inner.records.get(&clean_path(path)).cloned())
    }
}
