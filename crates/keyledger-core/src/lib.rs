mod convert;
pub mod error;
pub mod snapshot;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use snapshot::Snapshot;
pub use store::EntityStore;
