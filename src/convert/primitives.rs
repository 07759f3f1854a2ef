//! Buffered, fixed-width converters: bool and the binary numeric types.
//!
//! Each declares `get_size = Exact(n)` with `n` the type's wire width and
//! never populates `write_state_out` — the "buffered specialization"
//! pattern from §4.1. None of them encode SQL NULL themselves; that is the
//! nullable-lift decorator's job.
use crate::{
    catalog::PgType,
    error::Result,
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// The primitive binary converter for `T`; one instance per numeric/bool
/// wire type, shared as `&'static` by the resolver's default-pair table.
pub struct Primitive<T>(std::marker::PhantomData<fn() -> T>);

impl<T> Primitive<T> {
    pub const fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<T> Default for Primitive<T> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! fixed_width {
    ($ty:ty, $size:literal, $write:ident, $read:ident) => {
        impl Converter<$ty> for Primitive<$ty> {
            fn can_convert(&self, format: DataFormat) -> bool {
                matches!(format, DataFormat::Binary)
            }

            fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
                DbNullPredicateKind::None
            }

            fn is_db_null(&self, _value: &$ty) -> bool {
                false
            }

            fn get_size(&self, _ctx: &mut SizeContext, _value: &$ty) -> Result<ValueSize> {
                Ok(ValueSize::Exact($size))
            }

            fn write<W: PgWriter>(&self, writer: &mut W, value: &$ty, _state: &WriteState) -> Result<()> {
                writer.$write(*value);
                Ok(())
            }

            async fn write_async<W: PgWriter>(
                &self,
                writer: &mut W,
                value: &$ty,
                state: &WriteState,
                _cancel: &CancellationToken,
            ) -> Result<()> {
                self.write(writer, value, state)
            }

            fn read<R: PgReader>(&self, reader: &mut R) -> Result<$ty> {
                reader.$read()
            }

            async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<$ty> {
                cancel.check()?;
                self.read(reader)
            }
        }
    };
}

fixed_width!(i16, 2, write_i16, read_i16);
fixed_width!(i32, 4, write_i32, read_i32);
fixed_width!(i64, 8, write_i64, read_i64);

impl Converter<bool> for Primitive<bool> {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &bool) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, _value: &bool) -> Result<ValueSize> {
        Ok(ValueSize::Exact(1))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &bool, _state: &WriteState) -> Result<()> {
        writer.write_byte(*value as u8);
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &bool,
        state: &WriteState,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.write(writer, value, state)
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<bool> {
        Ok(reader.read_byte()? != 0)
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<bool> {
        cancel.check()?;
        self.read(reader)
    }
}

impl Converter<f32> for Primitive<f32> {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &f32) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, _value: &f32) -> Result<ValueSize> {
        Ok(ValueSize::Exact(4))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &f32, _state: &WriteState) -> Result<()> {
        writer.write_u32(value.to_bits());
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &f32,
        state: &WriteState,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.write(writer, value, state)
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<f32> {
        Ok(f32::from_bits(reader.read_u32()?))
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<f32> {
        cancel.check()?;
        self.read(reader)
    }
}

impl Converter<f64> for Primitive<f64> {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &f64) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, _value: &f64) -> Result<ValueSize> {
        Ok(ValueSize::Exact(8))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &f64, _state: &WriteState) -> Result<()> {
        writer.write_i64(value.to_bits() as i64);
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &f64,
        state: &WriteState,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.write(writer, value, state)
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<f64> {
        Ok(f64::from_bits(reader.read_i64()? as u64))
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<f64> {
        cancel.check()?;
        self.read(reader)
    }
}

/// The default canonical wire type for each numeric primitive (§4.5 table).
pub const fn canonical_wire_type<T: PgType>() -> crate::catalog::WireTypeName {
    T::WIRE_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    #[test]
    fn i32_round_trips_big_endian() {
        let converter = Primitive::<i32>::new();
        let bytes = write_then_read_back(&converter, &42i32, DataFormat::Binary);
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x2A]);

        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(converter.read(&mut reader).unwrap(), 42);
    }

    #[test]
    fn bool_is_one_byte() {
        let converter = Primitive::<bool>::new();
        let bytes = write_then_read_back(&converter, &true, DataFormat::Binary);
        assert_eq!(&bytes[..], &[1]);
    }

    #[test]
    fn f64_round_trips() {
        let converter = Primitive::<f64>::new();
        let bytes = write_then_read_back(&converter, &3.5f64, DataFormat::Binary);
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(converter.read(&mut reader).unwrap(), 3.5);
    }

    #[test]
    fn no_converter_reports_null() {
        let converter = Primitive::<i32>::new();
        assert!(!converter.is_db_null(&0));
        assert_eq!(converter.db_null_predicate_kind(), DbNullPredicateKind::None);
    }
}
