//! The `bytea` converter: a length-prefixed-by-the-caller raw byte string.
use crate::{
    error::Result,
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// Converter for `Vec<u8>` against the `bytea` wire type.
pub struct ByteaConverter;

impl Converter<Vec<u8>> for ByteaConverter {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &Vec<u8>) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, value: &Vec<u8>) -> Result<ValueSize> {
        Ok(ValueSize::Exact(value.len() as u32))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &Vec<u8>, _state: &WriteState) -> Result<()> {
        writer.write_raw(value)
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &Vec<u8>,
        _state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        writer.write_raw_async(value, cancel).await
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let n = reader.remaining();
        Ok(reader.read_bytes(n)?.to_vec())
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<Vec<u8>> {
        cancel.check()?;
        self.read(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    #[test]
    fn writes_raw_bytes() {
        let converter = ByteaConverter;
        let bytes = write_then_read_back(&converter, &vec![1u8, 2, 3], DataFormat::Binary);
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }
}
