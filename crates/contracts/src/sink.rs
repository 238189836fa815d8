//! Output side of the dispatcher

use crate::{ContractError, SyncedPair};

/// Destination for synchronized pairs
///
/// Each sink is driven by its own worker task, so a slow `write` only backs
/// up that sink's queue.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Name used in logs and metric labels
    fn name(&self) -> &str;

    /// Persist one pair; the error should name what failed
    async fn write(&mut self, pair: &SyncedPair) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Called once after the last pair, before the worker exits
    async fn close(&mut self) -> Result<(), ContractError>;
}
