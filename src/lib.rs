//! Type conversion and parameter binding core for a Postgres driver.
//!
//! This crate mediates between native application values and PostgreSQL's
//! binary wire format: a [`catalog::TypeCatalog`] tracks wire-type identity,
//! a [`convert::Converter`] encodes/decodes one application type against one
//! wire type, [`resolver::ConverterInfoResolver`] chooses the right one for
//! a given `(type, wire type)` pair, and [`param`] drives the two-phase
//! size-then-write protocol the extended-query protocol requires.
//!
//! The wire transport, command pipeline, result decoding, and connection
//! pool are out of scope here; [`wire::PgWriter`]/[`wire::PgReader`] are the
//! minimal contracts a driver's transport layer must implement.
//!
//! # Examples
//!
//! ```
//! use postro_types::{
//!     catalog::TypeCatalog,
//!     config::Config,
//!     info::ConverterInfo,
//!     param,
//!     resolver::{ConverterInfoResolver, DefaultResolver},
//!     wire::{FlushMode, MemoryWriter, PgWriter},
//! };
//!
//! # fn app() -> postro_types::Result<()> {
//! let resolver = DefaultResolver::new(TypeCatalog::with_builtins(), Config::new());
//! let info: ConverterInfo<i32, _> = <DefaultResolver as ConverterInfoResolver<i32>>::resolve(&resolver, None)?;
//!
//! let value = 42i32;
//! let parameter = param::size_static(&info, &value, 0, None)?;
//!
//! let mut writer = MemoryWriter::new(FlushMode::Blocking);
//! writer.initialize()?;
//! param::write_static(&info, &mut writer, &value, &parameter)?;
//! assert_eq!(writer.as_slice(), &42i32.to_be_bytes());
//! # Ok(())
//! # }
//! # app().unwrap();
//! ```

pub mod common;

pub mod catalog;
pub mod config;
pub mod format;
pub mod wire;

pub mod convert;
pub mod info;
pub mod resolver;

pub mod param;

mod error;

pub use catalog::{Oid, PgType, TypeCatalog, WireTypeId, WireTypeName};
pub use config::Config;
pub use convert::Converter;
pub use error::{Error, ErrorKind, Result};
pub use format::{DataFormat, DbNullPredicateKind, ValueSize};
pub use info::ConverterInfo;
pub use param::Parameter;
pub use resolver::{ConverterInfoResolver, DefaultResolver};
