//! The primitive unit of encode/decode: one application type bound to one
//! wire type, plus the decorators that build richer converters out of it.
mod array;
mod bytea;
mod nullable;
mod numeric;
mod primitives;
mod text;

#[cfg(feature = "time")]
mod temporal;

#[cfg(feature = "json")]
mod json;

pub use array::ArrayConverter;
pub use bytea::ByteaConverter;
pub use nullable::NullableConverter;
pub use numeric::NumericCoercionConverter;
pub use primitives::Primitive;
pub use text::{CharConverter, TextConverter, SHARED_TEXT_CONVERTER};

#[cfg(feature = "time")]
pub use temporal::{Timestamp, TimestampConverter};

#[cfg(feature = "json")]
pub use json::{Json, JsonConverter};

use crate::{
    error::Result,
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

/// A bidirectional codec for one application type `T` against one wire type.
///
/// Implementations are immutable after construction and safe to share
/// across sessions (§5); the two-phase `get_size`/`write` split is what lets
/// the parameter writer frame a value before any bytes are emitted.
pub trait Converter<T>: Send + Sync {
    /// Whether this converter can encode/decode in `format`.
    fn can_convert(&self, format: DataFormat) -> bool;

    /// How this converter decides `T` represents SQL NULL.
    fn db_null_predicate_kind(&self) -> DbNullPredicateKind;

    /// Whether `value` represents SQL NULL; when `true`, `write` is never called.
    fn is_db_null(&self, value: &T) -> bool;

    /// Computes the size `write` will produce, optionally recording
    /// [`WriteState`] for the write phase via `ctx.set_write_state`.
    fn get_size(&self, ctx: &mut SizeContext, value: &T) -> Result<ValueSize>;

    /// Synchronous write; may flush iff `writer.flush_mode() == Blocking`.
    fn write<W: PgWriter>(&self, writer: &mut W, value: &T, state: &WriteState) -> Result<()>;

    /// Asynchronous write; may flush iff `writer.flush_mode() == NonBlocking`.
    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &T,
        state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<T>;

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<T>;

    /// The value this converter treats as a decoded SQL NULL, if `T` has one.
    ///
    /// Lets a composite converter (e.g. [`ArrayConverter`]) reconstruct a null
    /// element from a `-1` wire length without calling `read` on zero bytes.
    /// Converters whose `T` carries no null representation return `None`,
    /// the default.
    fn null_value(&self) -> Option<T> {
        None
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{catalog::TypeCatalog, wire::{FlushMode, MemoryReader, MemoryWriter}};

    /// Drives a converter's size+write phases against a fresh [`MemoryWriter`]
    /// and returns the bytes produced, mirroring what the parameter writer
    /// does in phase 1/2 (§4.6). Panics on error, for test brevity.
    pub fn write_then_read_back<T, C: Converter<T>>(converter: &C, value: &T, format: DataFormat) -> bytes::Bytes {
        let mut ctx = SizeContext::new(format, 0);
        let size = converter.get_size(&mut ctx, value).expect("get_size");
        let state = ctx.take_write_state();

        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        writer.set_current_format(format);
        writer.initialize().unwrap();
        converter.write(&mut writer, value, &state).expect("write");

        if let ValueSize::Exact(n) = size {
            assert_eq!(writer.as_slice().len(), n as usize, "size honesty (property 2)");
        }

        writer.into_bytes()
    }

    pub fn catalog() -> TypeCatalog {
        TypeCatalog::with_builtins()
    }

    pub fn reader_for(bytes: bytes::Bytes) -> MemoryReader {
        MemoryReader::new(bytes)
    }
}
