pub mod transfer;

pub use transfer::{ReservedIdPolicy, TransferPolicy, TransferService};
