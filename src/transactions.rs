use std::{
    fs,
    marker::PhantomData,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

/// Enum of possible operations to rollback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOperation {
    RemoveFile(PathBuf),
    RemoveDir(PathBuf),
}
/// Active Transaction
pub struct Active;
/// Committed Transaction
pub struct Committed;
/// A trait that tells us if rollback should occur when dropped.
pub trait TransactionState {
    const SHOULD_ROLLBACK: bool;
}
impl TransactionState for Active {
    const SHOULD_ROLLBACK: bool = true;
}
impl TransactionState for Committed {
    const SHOULD_ROLLBACK: bool = false;
}
/// Tracks what a tree render created so it can be undone.
///
/// A [`Transaction<Active>`] that is dropped without being committed removes every
/// registered path, most recent first. Only paths the render itself created are ever
/// registered: files that existed before and were overwritten are left alone.
pub struct Transaction<State: TransactionState> {
    rollback_operations: Vec<RollbackOperation>,
    state: PhantomData<State>,
}
impl Transaction<Active> {
    pub fn new() -> Self {
        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }
    /// Finalizes the transaction, preventing any rollback from occurring.
    pub fn commit(mut self) -> Transaction<Committed> {
        self.rollback_operations.clear();

        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
}
impl Default for Transaction<Active> {
    fn default() -> Self {
        Self::new()
    }
}
impl<S: TransactionState> Drop for Transaction<S> {
    fn drop(&mut self) {
        if S::SHOULD_ROLLBACK && !self.rollback_operations.is_empty() {
            log::debug!("rolling back {} operations", self.rollback_operations.len());
            while let Some(operation) = self.rollback_operations.pop() {
                match operation {
                    RollbackOperation::RemoveDir(path) => {
                        log::debug!("removing dir: {}", path.display());
                        let _ = fs::remove_dir_all(&path);
                    }
                    RollbackOperation::RemoveFile(path) => {
                        log::debug!("removing file: {}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        } else if !S::SHOULD_ROLLBACK {
            log::debug!("committing transaction");
        }
    }
}

/// An active transaction that concurrent render jobs can register operations on.
#[derive(Default)]
pub struct SharedTransaction {
    inner: Mutex<Transaction<Active>>,
}
impl SharedTransaction {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_operation(&self, operation: RollbackOperation) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_operation(operation);
    }
    pub fn into_inner(self) -> Transaction<Active> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
    pub fn commit(self) -> Transaction<Committed> {
        self.into_inner().commit()
    }
}
