//! # Windows Registry Hive (REGF) Parser
//!
//! A read-only parser and navigator for the Windows Registry hive binary
//! format, built in layers that mirror the format itself:
//!
//! 1. [`io`] — the byte-source abstraction every other layer reads through.
//! 2. [`header`] / [`hbin`] — the hive base block and its list of bins.
//! 3. [`cell`] — the cell allocator, the unit every record lives inside.
//! 4. [`key`] / [`value`] / [`subkey_list`] / [`security`] / [`bigdata`] —
//!    the `nk`/`vk`/`lf`/`lh`/`li`/`ri`/`sk`/`db` record parsers.
//! 5. [`index`] — name- and path-based lookups over those records.
//! 6. [`data`] / [`multi_string`] — turning a value's storage into typed
//!    bytes.
//! 7. [`cache`] — bounded LRU caches so repeated navigation doesn't reparse.
//!
//! [`hive::Hive`] composes all of it into the public navigation API.
//!
//! ## Example
//!
//! ```no_run
//! use regf_core::Hive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hive = Hive::open("SOFTWARE", encoding_rs::WINDOWS_1252)?;
//! let root = hive.root_key()?;
//!
//! for sub_key in root.sub_keys() {
//!     println!("{}", sub_key.name());
//! }
//!
//! if let Some(value) = root.value_by_name("DisplayVersion")? {
//!     println!("{}", value.read_data()?.as_utf16_string()?);
//! }
//!
//! if hive.is_corrupted() {
//!     eprintln!("warning: hive had recoverable structural damage");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Non-goals
//!
//! This crate only reads hives. It does not write, repair, or save them,
//! and it does not apply transaction logs (`.LOG1`/`.LOG2`) — a hive is
//! read exactly as it sits on disk.

#![warn(clippy::all)]

pub mod bigdata;
pub mod cache;
pub mod cell;
pub mod data;
pub mod error;
pub mod hash;
pub mod hbin;
pub mod header;
pub mod hive;
pub mod index;
pub mod io;
pub mod key;
pub mod multi_string;
pub mod name;
pub mod security;
pub mod subkey_list;
pub mod utils;
pub mod value;

pub use cell::{CellType, KeyNodeFlags, ValueType};
pub use data::{ValueData, ValueDataSource};
pub use error::{RegistryError, Result};
pub use hbin::{BinsIndex, HbinHeader};
pub use header::BaseBlock;
pub use hive::{Hive, NamedKey, ValueItem};
pub use io::{ByteSource, FileSource, SliceSource};
pub use key::KeyNode;
pub use name::RawName;
pub use security::SecurityKey;
pub use subkey_list::SubkeyList;
pub use value::ValueKey;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
