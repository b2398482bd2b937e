//! Grouping of lookup records by resolved abuse contact.

use crate::lookup::LookupRecord;

/// Group key for records without a usable abuse contact.
pub const UNRESOLVED_KEY: &str = "__unresolved__";

/// Contact key → records, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactGroup {
    groups: Vec<(String, Vec<LookupRecord>)>,
}

impl ContactGroup {
    fn push(&mut self, key: &str, record: LookupRecord) {
        match self.groups.iter_mut().find(|(k, _)| k == key) {
            Some((_, records)) => records.push(record),
            None => self.groups.push((key.to_string(), vec![record])),
        }
    }

    /// Records filed under `key`.
    pub fn get(&self, key: &str) -> Option<&[LookupRecord]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, records)| records.as_slice())
    }

    /// Records without a contact, if any.
    pub fn unresolved(&self) -> Option<&[LookupRecord]> {
        self.get(UNRESOLVED_KEY)
    }

    /// Every group in iteration order, including the unresolved bucket.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LookupRecord])> {
        self.groups
            .iter()
            .map(|(k, records)| (k.as_str(), records.as_slice()))
    }

    /// Groups with a real contact, in iteration order.
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &[LookupRecord])> {
        self.iter().filter(|(k, _)| *k != UNRESOLVED_KEY)
    }

    /// Number of distinct keys (including the unresolved bucket).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<LookupRecord> for ContactGroup {
    fn from_iter<I: IntoIterator<Item = LookupRecord>>(iter: I) -> Self {
        let mut group = ContactGroup::default();
        for record in iter {
            let key = record.contact().unwrap_or(UNRESOLVED_KEY).to_string();
            group.push(&key, record);
        }
        group
    }
}

/// Partition records by abuse contact. Records with an absent or empty
/// contact go to [`UNRESOLVED_KEY`].
pub fn group<I>(records: I) -> ContactGroup
where
    I: IntoIterator<Item = LookupRecord>,
{
    records.into_iter().collect()
}
