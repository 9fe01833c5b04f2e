pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Member, Row};
pub use value::Value;
