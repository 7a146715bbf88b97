//! Transaction layer implementation

pub mod coordinator;

pub use coordinator::{
    IsolationLevel, Transaction, TransactionCoordinator, TransactionCoordinatorStats, TransactionId,
    TransactionState,
};
