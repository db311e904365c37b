//! Tree synchronizer: owns the presented tree and keeps it in step with
//! source, rules and journal.
//!
//! Every regeneration starts from scratch (build, then merge) and replays the
//! applied journal entries on top. Entries whose operands no longer resolve
//! are skipped and surfaced as [`StaleEdit`] warnings instead of failing the
//! rebuild. A cut whose paste goes stale is put back where it was taken from,
//! so a stale edit never leaves content stranded on the clipboard. The tree is handed out as `Arc` snapshots; edits go through
//! `Arc::make_mut`, so a snapshot held by a caller never changes under it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::error::ApplicationResult;
use crate::domain::{
    Anchor, Command, DocumentTree, DomainError, Journal, MergeEngine, MergeReport, MergeRules, NodeId,
    NodeView, SourceDocument, StructureBuilder,
};

/// A journal entry that could not be replayed onto the regenerated tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEdit {
    /// Position of the entry in the journal.
    pub index: usize,
    pub command: Command,
    pub reason: String,
}

impl fmt::Display for StaleEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edit #{} ({}) skipped: {}", self.index + 1, self.command, self.reason)
    }
}

/// Result of one full regeneration.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub tree: DocumentTree,
    pub rules: MergeRules,
    pub report: MergeReport,
    pub stale: Vec<StaleEdit>,
    /// Replayed entries in the form they resolved to on the new tree.
    pub resolved: Vec<(usize, Command)>,
}

/// Rebuild from `source`, apply the rules in effect, then replay the journal.
///
/// `base_rules` are the rules before any rule change recorded in `journal`.
#[instrument(level = "debug", skip_all, fields(applied = journal.cursor()))]
pub fn synchronize(
    source: &SourceDocument,
    base_rules: &MergeRules,
    journal: &Journal,
) -> ApplicationResult<SyncOutcome> {
    let rules = journal.current_rules(base_rules);
    rules.validate()?;

    let raw = StructureBuilder::new().build(source)?;
    let (mut tree, report) = MergeEngine::new(&rules).apply(&raw)?;

    let mut stale = Vec::new();
    let mut resolved = Vec::new();
    // Cut subtrees still on the clipboard: node -> (journal index, origin).
    let mut held: BTreeMap<NodeId, (usize, Anchor)> = BTreeMap::new();
    for (index, entry) in journal.applied().iter().enumerate() {
        if !entry.command.is_structural() {
            continue;
        }
        match replay(&mut tree, &entry.command)? {
            Ok(command) => {
                match &command {
                    Command::Cut { node, origin } => {
                        held.insert(*node, (index, *origin));
                    }
                    Command::Paste { node, .. } => {
                        held.remove(node);
                    }
                    _ => {}
                }
                resolved.push((index, command));
            }
            Err(reason) => {
                if let Command::Paste { node, .. } = &entry.command {
                    if let Some((cut_index, origin)) = held.remove(node) {
                        stale.push(restore_cut(&mut tree, *node, origin, cut_index, index)?);
                    }
                }
                let edit = StaleEdit {
                    index,
                    command: entry.command.clone(),
                    reason,
                };
                warn!(%edit, "stale edit");
                stale.push(edit);
            }
        }
    }
    stale.sort_by_key(|edit| edit.index);

    debug!(
        nodes = tree.len(),
        replayed = resolved.len(),
        stale = stale.len(),
        "synchronized"
    );
    Ok(SyncOutcome {
        tree,
        rules,
        report,
        stale,
        resolved,
    })
}

/// Execute one journal command during replay.
///
/// The outer result carries defects; the inner one a reason to skip the edit.
fn replay(tree: &mut DocumentTree, command: &Command) -> ApplicationResult<Result<Command, String>> {
    if let Some(missing) = command
        .operands()
        .into_iter()
        .find(|id| !tree.contains(*id) && !tree.in_clipboard(*id))
    {
        return Ok(Err(format!("node {missing} no longer exists")));
    }
    match command.execute(tree) {
        Ok(resolved) => Ok(Ok(resolved)),
        Err(DomainError::InvalidTarget { reason, .. }) => Ok(Err(reason)),
        Err(e) => Err(e.into()),
    }
}

/// Re-attach a cut subtree whose paste could not be replayed.
///
/// Tries the cut's origin first, then the end of the root. The returned
/// warning marks the cut as stale too, so undoing it only moves the cursor.
fn restore_cut(
    tree: &mut DocumentTree,
    node: NodeId,
    origin: Anchor,
    cut_index: usize,
    paste_index: usize,
) -> ApplicationResult<StaleEdit> {
    let fallback = Anchor::LastChild { parent: tree.root() };
    let mut placed = None;
    for target in [origin, fallback] {
        match (Command::Paste { node, target }).execute(tree) {
            Ok(_) => {
                placed = Some(target);
                break;
            }
            Err(DomainError::InvalidTarget { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let reason = match placed {
        Some(target) => format!(
            "its paste (edit #{}) could not be replayed, node restored at {target}",
            paste_index + 1
        ),
        None => format!(
            "its paste (edit #{}) could not be replayed, node left on the clipboard",
            paste_index + 1
        ),
    };
    let edit = StaleEdit {
        index: cut_index,
        command: Command::Cut { node, origin },
        reason,
    };
    warn!(%edit, "stale edit");
    Ok(edit)
}

type Listener = Box<dyn Fn(u64)>;

/// Single owner of the current document tree.
pub struct TreeSynchronizer {
    source: SourceDocument,
    base_rules: MergeRules,
    journal: Journal,
    tree: Arc<DocumentTree>,
    rules: MergeRules,
    report: MergeReport,
    stale: Vec<StaleEdit>,
    version: u64,
    listeners: Vec<Listener>,
}

impl fmt::Debug for TreeSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSynchronizer")
            .field("version", &self.version)
            .field("nodes", &self.tree.len())
            .field("journal", &self.journal.len())
            .field("stale", &self.stale.len())
            .finish()
    }
}

impl TreeSynchronizer {
    pub fn new(source: SourceDocument, rules: MergeRules) -> ApplicationResult<Self> {
        Self::with_journal(source, rules, Journal::new())
    }

    /// Start from a previously persisted journal.
    pub fn with_journal(
        source: SourceDocument,
        rules: MergeRules,
        journal: Journal,
    ) -> ApplicationResult<Self> {
        let SyncOutcome {
            tree,
            rules: current,
            report,
            stale,
            resolved,
        } = synchronize(&source, &rules, &journal)?;
        let mut journal = journal;
        for (index, command) in resolved {
            journal.replace(index, command);
        }
        Ok(Self {
            source,
            base_rules: rules,
            journal,
            tree: Arc::new(tree),
            rules: current,
            report,
            stale,
            version: 1,
            listeners: Vec::new(),
        })
    }

    /// Regenerate the tree from source, rules and journal.
    pub fn sync(&mut self) -> ApplicationResult<()> {
        self.rebuild()?;
        self.publish();
        Ok(())
    }

    /// Swap in a newly classified source. On error the current state is kept.
    pub fn replace_source(&mut self, source: SourceDocument) -> ApplicationResult<()> {
        let outcome = synchronize(&source, &self.base_rules, &self.journal)?;
        self.source = source;
        self.install(outcome);
        self.publish();
        Ok(())
    }

    /// Record a manual edit or rule change and apply it.
    ///
    /// A rejected command leaves tree and journal unchanged.
    #[instrument(level = "debug", skip(self), fields(op = command.kind()))]
    pub fn execute(&mut self, command: Command) -> ApplicationResult<Command> {
        if let Command::ChangeRules { next, .. } = &command {
            next.validate()?;
            // Rebuild against a scratch journal so a failure leaves no trace.
            let mut journal = self.journal.clone();
            journal.record(command.clone());
            let outcome = synchronize(&self.source, &self.base_rules, &journal)?;
            self.journal = journal;
            self.install(outcome);
            self.publish();
            return Ok(command);
        }

        let resolved = command.execute(Arc::make_mut(&mut self.tree))?;
        self.journal.record(resolved.clone());
        self.publish();
        Ok(resolved)
    }

    pub fn cut(&mut self, node: NodeId) -> ApplicationResult<Command> {
        let command = Command::cut(&self.tree, node)?;
        self.execute(command)
    }

    pub fn paste_into(&mut self, node: NodeId, parent: NodeId, index: usize) -> ApplicationResult<Command> {
        self.execute(Command::paste_into(node, parent, index))
    }

    pub fn paste_after(&mut self, node: NodeId, sibling: NodeId) -> ApplicationResult<Command> {
        self.execute(Command::paste_after(node, sibling))
    }

    pub fn promote(&mut self, node: NodeId) -> ApplicationResult<Command> {
        let command = Command::promote(&self.tree, node)?;
        self.execute(command)
    }

    pub fn demote(&mut self, node: NodeId) -> ApplicationResult<Command> {
        let command = Command::demote(&self.tree, node)?;
        self.execute(command)
    }

    /// Replace the merge rules; recorded in the journal like any edit.
    pub fn set_rules(&mut self, rules: MergeRules) -> ApplicationResult<()> {
        let previous = self.rules.clone();
        self.execute(Command::change_rules(previous, rules))?;
        Ok(())
    }

    /// Revert the most recent applied entry. Returns `false` when there is nothing to undo.
    #[instrument(level = "debug", skip(self))]
    pub fn undo(&mut self) -> ApplicationResult<bool> {
        let Some(entry) = self.journal.undo().cloned() else {
            return Ok(false);
        };
        let index = self.journal.cursor();

        if !entry.command.is_structural() {
            self.rebuild()?;
        } else if let Some(position) = self.stale.iter().position(|s| s.index == index) {
            // Never applied to this tree, so there is nothing to revert.
            self.stale.remove(position);
        } else {
            let inverse = entry.command.invert();
            if let Err(e) = inverse.execute(Arc::make_mut(&mut self.tree)) {
                warn!(command = %entry.command, error = %e, "inverse failed, regenerating");
                self.rebuild()?;
            }
        }
        self.publish();
        Ok(true)
    }

    /// Re-apply the entry at the cursor. Returns `false` when there is nothing to redo.
    #[instrument(level = "debug", skip(self))]
    pub fn redo(&mut self) -> ApplicationResult<bool> {
        let Some(entry) = self.journal.redo().cloned() else {
            return Ok(false);
        };
        let index = self.journal.cursor() - 1;

        if entry.command.is_structural() {
            match replay(Arc::make_mut(&mut self.tree), &entry.command)? {
                Ok(resolved) => self.journal.replace(index, resolved),
                Err(reason) => {
                    if let Some((node, cut_index, origin)) = self.held_cut(index, &entry.command) {
                        let tree = Arc::make_mut(&mut self.tree);
                        let restored = restore_cut(tree, node, origin, cut_index, index)?;
                        self.stale.push(restored);
                    }
                    let edit = StaleEdit {
                        index,
                        command: entry.command,
                        reason,
                    };
                    warn!(%edit, "stale edit");
                    self.stale.push(edit);
                    self.stale.sort_by_key(|edit| edit.index);
                }
            }
        } else {
            self.rebuild()?;
        }
        self.publish();
        Ok(true)
    }

    /// Register a callback invoked with the new version after every change.
    pub fn subscribe(&mut self, listener: impl Fn(u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Immutable snapshot of the current tree.
    pub fn snapshot(&self) -> Arc<DocumentTree> {
        Arc::clone(&self.tree)
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn view(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.tree.view(id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rules currently in effect.
    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    pub fn report(&self) -> MergeReport {
        self.report
    }

    /// Stale-edit warnings from the latest regeneration and redo.
    pub fn warnings(&self) -> &[StaleEdit] {
        &self.stale
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn can_undo(&self) -> bool {
        self.journal.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.journal.can_redo()
    }

    /// The applied cut still holding the node a stale paste at `index` wanted.
    fn held_cut(&self, index: usize, command: &Command) -> Option<(NodeId, usize, Anchor)> {
        let Command::Paste { node, .. } = command else {
            return None;
        };
        if self.tree.clipboard_roots().all(|root| root != *node) {
            return None;
        }
        self.journal.applied()[..index]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(position, entry)| match entry.command {
                Command::Cut { node: cut, origin } if cut == *node => Some((position, origin)),
                _ => None,
            })
            .filter(|(position, _)| self.stale.iter().all(|s| s.index != *position))
            .map(|(position, origin)| (*node, position, origin))
    }

    fn rebuild(&mut self) -> ApplicationResult<()> {
        let outcome = synchronize(&self.source, &self.base_rules, &self.journal)?;
        self.install(outcome);
        Ok(())
    }

    fn install(&mut self, outcome: SyncOutcome) {
        for (index, command) in outcome.resolved {
            self.journal.replace(index, command);
        }
        self.tree = Arc::new(outcome.tree);
        self.rules = outcome.rules;
        self.report = outcome.report;
        self.stale = outcome.stale;
    }

    fn publish(&mut self) {
        self.version += 1;
        debug!(version = self.version, "tree version changed");
        for listener in &self.listeners {
            listener(self.version);
        }
    }
}
