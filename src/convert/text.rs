//! The shared `text` converter and the small adapters built on top of it
//! (§4.5 step 4: "wrap a shared read-only-memory text converter").
//!
//! Postgres's binary and text wire formats for `text` itself are both raw
//! UTF-8 bytes, so this converter accepts either [`DataFormat`].
use crate::{
    error::Result,
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// The process-wide shared `text` converter; every string-like application
/// type is an adapter over this one instance (§9 "Global state").
pub struct TextConverter;

pub static SHARED_TEXT_CONVERTER: TextConverter = TextConverter;

impl Converter<String> for TextConverter {
    fn can_convert(&self, _format: DataFormat) -> bool {
        true
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &String) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, value: &String) -> Result<ValueSize> {
        Ok(ValueSize::Exact(value.len() as u32))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &String, _state: &WriteState) -> Result<()> {
        writer.write_text(value);
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &String,
        _state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut offset = 0;
        while let Some(next) = writer.write_text_resumable(value, offset) {
            cancel.check()?;
            offset = next;
        }
        Ok(())
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<String> {
        let n = reader.remaining();
        let bytes = reader.read_bytes(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            crate::error::InvalidWireData {
                wire_type: "text".into(),
                reason: e.to_string().into(),
            }
            .into()
        })
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<String> {
        cancel.check()?;
        self.read(reader)
    }
}

/// Adapter from [`TextConverter`] to a single Unicode scalar value.
pub struct CharConverter;

impl Converter<char> for CharConverter {
    fn can_convert(&self, format: DataFormat) -> bool {
        SHARED_TEXT_CONVERTER.can_convert(format)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &char) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, value: &char) -> Result<ValueSize> {
        Ok(ValueSize::Exact(value.len_utf8() as u32))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &char, _state: &WriteState) -> Result<()> {
        let mut buf = [0u8; 4];
        writer.write_text(value.encode_utf8(&mut buf));
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &char,
        state: &WriteState,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.write(writer, value, state)
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<char> {
        let s = SHARED_TEXT_CONVERTER.read(reader)?;
        s.chars().next().ok_or_else(|| {
            crate::error::InvalidWireData { wire_type: "text".into(), reason: "empty value for char".into() }.into()
        })
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<char> {
        cancel.check()?;
        self.read(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    #[test]
    fn string_round_trips() {
        let bytes = write_then_read_back(&TextConverter, &"hello".to_string(), DataFormat::Binary);
        assert_eq!(&bytes[..], b"hello");
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(TextConverter.read(&mut reader).unwrap(), "hello");
    }

    #[test]
    fn text_accepts_both_formats() {
        assert!(TextConverter.can_convert(DataFormat::Binary));
        assert!(TextConverter.can_convert(DataFormat::Text));
    }

    #[test]
    fn char_round_trips_multibyte() {
        let bytes = write_then_read_back(&CharConverter, &'λ', DataFormat::Binary);
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(CharConverter.read(&mut reader).unwrap(), 'λ');
    }
}
