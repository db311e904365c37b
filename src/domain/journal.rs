//! Ordered edit journal with an undo/redo cursor.
//!
//! The journal stores commands only; it never holds tree snapshots. Undo is
//! performed by executing [`Command::invert`] of the entry under the cursor.

use serde::{Deserialize, Serialize};

use crate::domain::command::Command;
use crate::domain::rules::MergeRules;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawJournal")]
pub struct Journal {
    entries: Vec<JournalEntry>,
    /// Number of entries currently applied (<= entries.len()).
    cursor: usize,
    next_sequence: u64,
}

/// Journal as read from disk, before the cursor is checked.
#[derive(Deserialize)]
struct RawJournal {
    #[serde(default)]
    entries: Vec<JournalEntry>,
    #[serde(default)]
    cursor: usize,
    #[serde(default)]
    next_sequence: u64,
}

impl From<RawJournal> for Journal {
    fn from(raw: RawJournal) -> Self {
        let next_sequence = raw
            .entries
            .iter()
            .map(|entry| entry.sequence + 1)
            .max()
            .unwrap_or_default()
            .max(raw.next_sequence);
        Self {
            cursor: raw.cursor.min(raw.entries.len()),
            entries: raw.entries,
            next_sequence,
        }
    }
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command after the cursor, dropping any redo tail.
    pub fn record(&mut self, command: Command) -> u64 {
        if self.cursor < self.entries.len() {
            self.entries.truncate(self.cursor);
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(JournalEntry { sequence, command });
        self.cursor = self.entries.len();
        sequence
    }

    /// Step the cursor back, returning the entry that is no longer applied.
    pub fn undo(&mut self) -> Option<&JournalEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step the cursor forward, returning the entry that is applied again.
    pub fn redo(&mut self) -> Option<&JournalEntry> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor - 1)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Entries up to the cursor, in application order.
    pub fn applied(&self) -> &[JournalEntry] {
        &self.entries[..self.cursor]
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Swap the command stored at `index`, keeping its sequence number.
    ///
    /// Used to store a command in the form it was resolved to on execution.
    pub fn replace(&mut self, index: usize, command: Command) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.command = command;
        }
    }

    /// Rules in effect after the applied entries, starting from `base`.
    pub fn current_rules(&self, base: &MergeRules) -> MergeRules {
        self.applied()
            .iter()
            .fold(base.clone(), |rules, entry| match &entry.command {
                Command::ChangeRules { next, .. } => next.clone(),
                _ => rules,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::NodeId;

    fn paste(node: u32) -> Command {
        Command::paste_after(NodeId(node), NodeId(1))
    }

    #[test]
    fn given_undone_entries_when_recording_then_redo_tail_is_dropped() {
        let mut journal = Journal::new();
        journal.record(paste(2));
        journal.record(paste(3));
        journal.undo();

        journal.record(paste(4));

        assert_eq!(journal.len(), 2);
        assert!(!journal.can_redo());
        assert_eq!(journal.applied()[1].command, paste(4));
        assert_eq!(journal.applied()[1].sequence, 2);
    }

    #[test]
    fn given_empty_journal_when_undoing_then_nothing_happens() {
        let mut journal = Journal::new();

        assert!(journal.undo().is_none());
        assert!(journal.redo().is_none());
        assert_eq!(journal.cursor(), 0);
    }

    #[test]
    fn given_cursor_past_end_when_deserializing_then_clamped() {
        let json = r#"{"entries":[{"sequence":4,"command":{"op":"cut","node":2,"origin":{"at":"last-child","parent":1}}}],"cursor":7}"#;

        let mut journal: Journal = serde_json::from_str(json).unwrap();

        assert_eq!(journal.cursor(), 1);
        assert_eq!(journal.record(paste(3)), 5);
    }

    #[test]
    fn given_rule_changes_when_undoing_then_current_rules_follow_cursor() {
        let base = MergeRules::default();
        let shallow = MergeRules::new(1).unwrap();
        let mut journal = Journal::new();
        journal.record(Command::change_rules(base.clone(), shallow.clone()));

        assert_eq!(journal.current_rules(&base), shallow);
        journal.undo();
        assert_eq!(journal.current_rules(&base), base);
    }
}
