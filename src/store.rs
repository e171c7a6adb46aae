use std::collections::BTreeMap;

use crate::{
    cert::Certificate,
    entry::{Entry, EntryKind},
};

/// Entries keyed by lowercased alias, iterated in insertion order
#[derive(Debug, Clone, Default)]
pub(crate) struct EntryStore {
    by_alias: BTreeMap<String, u64>,
    entries: BTreeMap<u64, Entry>,
    next_seq: u64,
}

fn normalize(alias: &str) -> String {
    alias.to_lowercase()
}

impl EntryStore {
    pub fn get(&self, alias: &str) -> Option<&Entry> {
        self.by_alias
            .get(&normalize(alias))
            .and_then(|seq| self.entries.get(seq))
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut Entry> {
        self.by_alias
            .get(&normalize(alias))
            .and_then(|seq| self.entries.get_mut(seq))
    }

    /// Insert or overwrite; an overwritten entry keeps its position
    pub fn put(&mut self, entry: Entry) -> Option<Entry> {
        let key = normalize(&entry.alias);
        match self.by_alias.get(&key) {
            Some(seq) => self.entries.insert(*seq, entry),
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.by_alias.insert(key, seq);
                self.entries.insert(seq, entry)
            }
        }
    }

    pub fn remove(&mut self, alias: &str) -> Option<Entry> {
        let seq = self.by_alias.remove(&normalize(alias))?;
        self.entries.remove(&seq)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.by_alias.contains_key(&normalize(alias))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Alias of the first entry whose certificate (or chain leaf) equals the given one
    pub fn alias_of(&self, cert: &Certificate) -> Option<&str> {
        self.iter()
            .find(|e| e.certificate() == Some(cert))
            .map(|e| e.alias.as_str())
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.iter().filter(|e| e.kind() == kind).count()
    }

    /// Certificates held across all entries, chain members included
    pub fn certificate_count(&self) -> usize {
        self.iter().map(Entry::certificate_count).sum()
    }
}
