use crate::config::SupersededPolicy;
use recon_types::{Record, Side};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Records of one key waiting for their counterpart.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    records: VecDeque<Record>,
    first_seen: u64,
    last_seen: Instant,
}

impl PendingEntry {
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// One side's unmatched records, keyed by primary key.
#[derive(Debug)]
pub struct PendingSet {
    side: Side,
    policy: SupersededPolicy,
    entries: HashMap<String, PendingEntry>,
    records: usize,
    arrivals: u64,
}

impl PendingSet {
    pub fn new(side: Side, policy: SupersededPolicy) -> Self {
        Self {
            side,
            policy,
            entries: HashMap::new(),
            records: 0,
            arrivals: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Adds a record under `key`. Returns true when an older pending
    /// version was replaced.
    pub fn insert(&mut self, key: String, record: Record) -> bool {
        self.arrivals += 1;
        let now = Instant::now();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_seen = now;
                match self.policy {
                    SupersededPolicy::LatestWins => {
                        entry.records.clear();
                        entry.records.push_back(record);
                        true
                    }
                    SupersededPolicy::RetainAll => {
                        entry.records.push_back(record);
                        self.records += 1;
                        false
                    }
                }
            }
            None => {
                self.entries.insert(
                    key,
                    PendingEntry {
                        records: VecDeque::from([record]),
                        first_seen: self.arrivals,
                        last_seen: now,
                    },
                );
                self.records += 1;
                false
            }
        }
    }

    /// Removes and returns the oldest pending record for `key`.
    pub fn take(&mut self, key: &str) -> Option<Record> {
        let entry = self.entries.get_mut(key)?;
        let record = entry.records.pop_front();
        if entry.records.is_empty() {
            self.entries.remove(key);
        }
        if record.is_some() {
            self.records -= 1;
        }
        record
    }

    pub fn get(&self, key: &str) -> Option<&PendingEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct pending keys.
    pub fn keys(&self) -> usize {
        self.entries.len()
    }

    /// Number of pending records (equals [`Self::keys`] under
    /// [`SupersededPolicy::LatestWins`]).
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Empties the set, returning every record in the order its key first
    /// arrived (versions of one key oldest first).
    pub fn drain(&mut self) -> Vec<(String, Record)> {
        let mut entries: Vec<(String, PendingEntry)> = self.entries.drain().collect();
        entries.sort_by_key(|(_, entry)| entry.first_seen);
        self.records = 0;
        entries
            .into_iter()
            .flat_map(|(key, entry)| {
                entry
                    .records
                    .into_iter()
                    .map(move |record| (key.clone(), record))
            })
            .collect()
    }
}
