//! The array decorator: `Converter<U> -> Converter<Vec<U>>`, produced by a
//! factory over the resolver's result for element `U` (§4.2, §4.5).
use crate::{
    catalog::{Oid, TypeCatalog, WireTypeId},
    error::{InvalidWireData, Result},
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, FlushMode, MemoryReader, MemoryWriter, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// Wraps `Converter<U>` to produce a `Converter<Vec<U>>` targeting the
/// one-dimensional array wire type over `U`'s element wire type.
///
/// The element [`Oid`] is resolved once, at construction, from the
/// [`TypeCatalog`] that was live when the factory built this instance —
/// unlike [`crate::catalog::PgType::WIRE_TYPE`], which is a compile-time
/// constant shared across sessions, this value is session-scoped and baked
/// in by whoever resolves the converter (§4.5).
pub struct ArrayConverter<U, C> {
    inner: C,
    element_oid: Oid,
    _marker: std::marker::PhantomData<fn() -> U>,
}

impl<U, C: Converter<U>> ArrayConverter<U, C> {
    pub fn new(inner: C, catalog: &TypeCatalog, element_id: &WireTypeId) -> Result<Self> {
        let element_oid = catalog.oid_of(element_id)?;
        Ok(Self { inner, element_oid, _marker: std::marker::PhantomData })
    }
}

impl<U: Send + Sync, C: Converter<U>> Converter<Vec<U>> for ArrayConverter<U, C> {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        // An absent array is represented by wrapping in `Option<Vec<U>>`
        // via the nullable-lift decorator, not by any sentinel `Vec` value.
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &Vec<U>) -> bool {
        false
    }

    fn get_size(&self, ctx: &mut SizeContext, value: &Vec<U>) -> Result<ValueSize> {
        // header(12) + one dimension descriptor(8), omitted entirely for an
        // empty array (ndim = 0), matching how Postgres itself encodes it.
        let mut total: u32 = if value.is_empty() { 12 } else { 12 + 8 };
        for item in value {
            total = total.saturating_add(4); // per-element length prefix
            if self.inner.is_db_null(item) {
                continue;
            }
            let mut elem_ctx = SizeContext::new(ctx.format, ctx.buffer_length);
            match self.inner.get_size(&mut elem_ctx, item)? {
                ValueSize::Exact(n) => total = total.saturating_add(n),
                _ => return Ok(ValueSize::Unknown),
            }
        }
        Ok(ValueSize::Exact(total))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &Vec<U>, _state: &WriteState) -> Result<()> {
        write_header(writer, value.len(), self.element_oid, value.iter().any(|v| self.inner.is_db_null(v)));
        for item in value {
            if self.inner.is_db_null(item) {
                writer.write_i32(-1);
                continue;
            }
            let mut scratch = MemoryWriter::new(FlushMode::None);
            scratch.set_current_format(writer.current_format());
            let mut ctx = SizeContext::new(writer.current_format(), 0);
            self.inner.get_size(&mut ctx, item)?;
            let state = ctx.take_write_state();
            self.inner.write(&mut scratch, item, &state)?;
            writer.write_i32(scratch.as_slice().len() as i32);
            writer.write_raw(scratch.as_slice())?;
        }
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &Vec<U>,
        _state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        write_header(writer, value.len(), self.element_oid, value.iter().any(|v| self.inner.is_db_null(v)));
        for item in value {
            cancel.check()?;
            if self.inner.is_db_null(item) {
                writer.write_i32(-1);
                continue;
            }
            let mut scratch = MemoryWriter::new(FlushMode::None);
            scratch.set_current_format(writer.current_format());
            let mut ctx = SizeContext::new(writer.current_format(), 0);
            self.inner.get_size(&mut ctx, item)?;
            let state = ctx.take_write_state();
            self.inner.write_async(&mut scratch, item, &state, cancel).await?;
            writer.write_i32(scratch.as_slice().len() as i32);
            writer.write_raw_async(scratch.as_slice(), cancel).await?;
        }
        Ok(())
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<Vec<U>> {
        let ndim = reader.read_i32()?;
        let has_nulls = reader.read_i32()? != 0;
        let _element_oid = reader.read_u32()?;
        if ndim == 0 {
            return Ok(Vec::new());
        }
        if ndim != 1 {
            return Err(InvalidWireData {
                wire_type: "array".into(),
                reason: "only one-dimensional arrays are supported".into(),
            }
            .into());
        }

        let length = reader.read_i32()?;
        let _lower_bound = reader.read_i32()?;
        let mut out = Vec::with_capacity(length.max(0) as usize);
        for _ in 0..length {
            let elem_len = reader.read_i32()?;
            if elem_len < 0 {
                debug_assert!(has_nulls);
                match self.inner.null_value() {
                    Some(null) => {
                        out.push(null);
                        continue;
                    }
                    None => {
                        return Err(InvalidWireData {
                            wire_type: "array".into(),
                            reason: "null element decoded into a non-nullable element type".into(),
                        }
                        .into());
                    }
                }
            }
            let bytes = reader.read_bytes(elem_len as usize)?.to_vec();
            let mut elem_reader = MemoryReader::new(bytes);
            out.push(self.inner.read(&mut elem_reader)?);
        }
        Ok(out)
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<Vec<U>> {
        cancel.check()?;
        self.read(reader)
    }
}

fn write_header<W: PgWriter>(writer: &mut W, len: usize, element_oid: Oid, has_nulls: bool) {
    if len == 0 {
        writer.write_i32(0);
        writer.write_i32(0);
        writer.write_u32(element_oid);
        return;
    }
    writer.write_i32(1);
    writer.write_i32(has_nulls as i32);
    writer.write_u32(element_oid);
    writer.write_i32(len as i32);
    writer.write_i32(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{nullable::NullableConverter, primitives::Primitive, test_support::{catalog, write_then_read_back}};

    #[test]
    fn encodes_header_dims_and_elements() {
        // Scenario E (§8).
        let catalog = catalog();
        let converter =
            ArrayConverter::new(Primitive::<i32>::new(), &catalog, &WireTypeId::name("int4")).unwrap();
        let bytes = write_then_read_back(&converter, &vec![1i32, 2, 3], DataFormat::Binary);

        assert_eq!(&bytes[0..4], &1i32.to_be_bytes()); // ndim
        assert_eq!(&bytes[4..8], &0i32.to_be_bytes()); // has_nulls
        assert_eq!(&bytes[8..12], &23u32.to_be_bytes()); // int4 oid
        assert_eq!(&bytes[12..16], &3i32.to_be_bytes()); // length
        assert_eq!(&bytes[16..20], &1i32.to_be_bytes()); // lower bound
        assert_eq!(&bytes[20..24], &4i32.to_be_bytes()); // element length
        assert_eq!(&bytes[24..28], &1i32.to_be_bytes()); // element 1
    }

    #[test]
    fn empty_array_has_zero_ndim() {
        let catalog = catalog();
        let converter =
            ArrayConverter::new(Primitive::<i32>::new(), &catalog, &WireTypeId::name("int4")).unwrap();
        let bytes = write_then_read_back(&converter, &Vec::<i32>::new(), DataFormat::Binary);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &0i32.to_be_bytes());
    }

    #[test]
    fn round_trips_through_read() {
        let catalog = catalog();
        let converter =
            ArrayConverter::new(Primitive::<i32>::new(), &catalog, &WireTypeId::name("int4")).unwrap();
        let bytes = write_then_read_back(&converter, &vec![10i32, 20, 30], DataFormat::Binary);
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(converter.read(&mut reader).unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn unknown_element_type_fails_construction() {
        let catalog = catalog();
        assert!(ArrayConverter::new(Primitive::<i32>::new(), &catalog, &WireTypeId::name("nope")).is_err());
    }

    #[test]
    fn nullable_element_round_trips_through_read() {
        // Property 1 (§8): a null element written through a nullable inner
        // converter must read back as the same null, not an error.
        let catalog = catalog();
        let converter = ArrayConverter::new(
            NullableConverter::new(Primitive::<i32>::new()),
            &catalog,
            &WireTypeId::name("int4"),
        )
        .unwrap();
        let value = vec![Some(1i32), None, Some(3)];
        let bytes = write_then_read_back(&converter, &value, DataFormat::Binary);
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(converter.read(&mut reader).unwrap(), value);
    }
}
