//! Mapping from public addresses to the log lines that mention them.

use std::collections::HashMap;

use tracing::debug;

use crate::netutil::{self, Address};

/// Public addresses in first-seen order, each with the lines that
/// contained it.
#[derive(Debug, Clone, Default)]
pub struct LogIndex {
    entries: Vec<(Address, Vec<String>)>,
    positions: HashMap<Address, usize>,
}

impl LogIndex {
    /// Build the index from raw lines.
    ///
    /// Every public address found in a line gets the line appended verbatim,
    /// once per distinct address in that line. Private addresses are dropped.
    pub fn build<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        let mut scanned = 0usize;
        for line in lines {
            let line = line.as_ref();
            scanned += 1;
            for addr in netutil::extract(line) {
                if addr.is_public() {
                    index.push(addr, line);
                }
            }
        }
        debug!(
            lines = scanned,
            addresses = index.len(),
            "log index built"
        );
        index
    }

    fn push(&mut self, addr: Address, line: &str) {
        match self.positions.get(&addr) {
            Some(&pos) => self.entries[pos].1.push(line.to_string()),
            None => {
                self.positions.insert(addr, self.entries.len());
                self.entries.push((addr, vec![line.to_string()]));
            }
        }
    }

    /// Drop every address seen on fewer than `min` lines.
    pub fn retain_min_occurrences(&mut self, min: usize) {
        if min <= 1 {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|(_, lines)| lines.len() >= min);
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (addr, _))| (*addr, pos))
            .collect();
        debug!(
            min,
            dropped = before - self.entries.len(),
            "applied minimum occurrence filter"
        );
    }

    /// Lines recorded for `addr`, in input order.
    pub fn lines_for(&self, addr: &Address) -> &[String] {
        self.positions
            .get(addr)
            .map(|&pos| self.entries[pos].1.as_slice())
            .unwrap_or(&[])
    }

    /// Addresses in first-seen order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|(addr, _)| *addr).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &[String])> {
        self.entries
            .iter()
            .map(|(addr, lines)| (addr, lines.as_slice()))
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.positions.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_ssh_log_grouping() {
        let lines = [
            "Failed password for root from 203.0.113.5 port 22",
            "Failed password for admin from 203.0.113.5 port 22",
            "Connection attempt from 198.51.100.10",
        ];
        let index = LogIndex::build(lines);

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.lines_for(&addr("203.0.113.5")),
            &[lines[0].to_string(), lines[1].to_string()]
        );
        assert_eq!(
            index.lines_for(&addr("198.51.100.10")),
            &[lines[2].to_string()]
        );
        assert_eq!(
            index.addresses(),
            vec![addr("203.0.113.5"), addr("198.51.100.10")]
        );
    }

    #[test]
    fn test_private_addresses_excluded() {
        let index = LogIndex::build(["from 10.0.0.1 via 192.168.1.1 and ::1"]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_line_with_two_addresses_indexed_under_both() {
        let line = "203.0.113.5 -> 198.51.100.10 (and again 203.0.113.5)";
        let index = LogIndex::build([line]);
        assert_eq!(index.lines_for(&addr("203.0.113.5")), &[line.to_string()]);
        assert_eq!(index.lines_for(&addr("198.51.100.10")), &[line.to_string()]);
    }

    #[test]
    fn test_repeated_input_line_appended_each_time() {
        let line = "Connection attempt from 198.51.100.10";
        let index = LogIndex::build([line, line]);
        assert_eq!(index.lines_for(&addr("198.51.100.10")).len(), 2);
    }

    #[test]
    fn test_min_occurrences_filter() {
        let mut index = LogIndex::build([
            "a 203.0.113.5",
            "b 203.0.113.5",
            "c 198.51.100.10",
            "d 2001:db8::7",
            "e 2001:db8::7",
        ]);
        index.retain_min_occurrences(2);
        assert_eq!(
            index.addresses(),
            vec![addr("203.0.113.5"), addr("2001:db8::7")]
        );
        assert!(!index.contains(&addr("198.51.100.10")));
        assert_eq!(index.lines_for(&addr("2001:db8::7")).len(), 2);
    }

    #[test]
    fn test_unknown_address_has_no_lines() {
        let index = LogIndex::build(Vec::<String>::new());
        assert!(index.lines_for(&addr("203.0.113.5")).is_empty());
    }
}
