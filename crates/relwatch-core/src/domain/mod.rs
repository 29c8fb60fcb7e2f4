//! Domain model for relwatch.
//!
//! - `RawRow`: one opaque row as fetched from the record store
//! - `PackageRecord`: typed app/version record with attached children
//! - `fields`: coercions from dynamic field values
//! - `error`: run, configuration and port errors

pub mod error;
pub mod fields;
pub mod record;

pub use error::{ConfigError, PortError, PortResult, RelwatchError, Result};
pub use fields::FieldMap;
pub use record::{
    FileInfo, LinkInfo, PackageRecord, PackageStatus, ParentReference, RawRow, UserInfo,
};
