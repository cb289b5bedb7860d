//! Rename transaction model.

use std::fmt;
use std::path::PathBuf;

/// Step reached by a rename transaction.
///
/// `Pending → Moved → IndexUpdated` on success,
/// `Pending → Moved → RollbackAttempted → Failed` when the audit log or the
/// index refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Moved,
    IndexUpdated,
    RollbackAttempted,
    Failed,
}

impl TransactionState {
    /// Whether `next` may follow this state.
    pub fn allows(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Pending, Moved)
                | (Moved, IndexUpdated)
                | (Moved, RollbackAttempted)
                | (RollbackAttempted, Failed)
        )
    }
}

/// One file move tracked through its states.
#[derive(Debug, Clone)]
pub struct RenameTransaction {
    pub item_id: String,
    pub from: PathBuf,
    pub to: PathBuf,
    pub state: TransactionState,
}

impl RenameTransaction {
    pub fn new(item_id: &str, from: PathBuf, to: PathBuf) -> Self {
        Self {
            item_id: item_id.to_string(),
            from,
            to,
            state: TransactionState::Pending,
        }
    }

    /// Move to the next state.
    pub fn advance(&mut self, next: TransactionState) {
        debug_assert!(
            self.state.allows(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("[{}] {:?} -> {:?}", self.item_id, self.state, next);
        self.state = next;
    }

    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::IndexUpdated
    }

    pub fn audit_entry(&self) -> AuditEntry<'_> {
        AuditEntry {
            item_id: &self.item_id,
            old: &self.from,
            new: &self.to,
        }
    }
}

/// Line of the audit log: `itemId|oldPath|newPath`.
#[derive(Debug, Clone, Copy)]
pub struct AuditEntry<'a> {
    pub item_id: &'a str,
    pub old: &'a std::path::Path,
    pub new: &'a std::path::Path,
}

impl fmt::Display for AuditEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.item_id, self.old.display(), self.new.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use TransactionState::*;
        assert!(Pending.allows(Moved));
        assert!(Moved.allows(RollbackAttempted));
        assert!(!Pending.allows(IndexUpdated));
        assert!(!IndexUpdated.allows(RollbackAttempted));
    }

    #[test]
    fn test_audit_entry_format() {
        let mut tx = RenameTransaction::new("12", PathBuf::from("/a/x.zip"), PathBuf::from("/b/y.zip"));
        tx.advance(TransactionState::Moved);
        tx.advance(TransactionState::IndexUpdated);
        assert!(tx.is_committed());
        assert_eq!(tx.audit_entry().to_string(), "12|/a/x.zip|/b/y.zip");
    }
}
