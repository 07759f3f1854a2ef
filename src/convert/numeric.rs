//! The numeric-coercion decorator: `Converter<U> -> Converter<T>` for any
//! numeric `T`, via checked conversion (§4.2).
use crate::{
    error::{Result, ValueOutOfRange},
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// The write-state a coercion records: the already-converted wire value
/// plus whatever scratch the inner converter itself wanted to carry.
struct CoercedState<U> {
    value: U,
    inner: WriteState,
}

/// Wraps `Converter<U>` (a numeric wire type, e.g. `int4`) to produce a
/// `Converter<T>` for any numeric `T` (e.g. `u8`, `i64`), using *checked*
/// conversion: out-of-range values fail with `value_out_of_range` rather
/// than wrapping or truncating.
pub struct NumericCoercionConverter<U, C> {
    inner: C,
    wire_type_name: &'static str,
    _marker: std::marker::PhantomData<fn() -> U>,
}

impl<U, C> NumericCoercionConverter<U, C> {
    /// `wire_type_name` is only used to populate error messages.
    pub fn new(inner: C, wire_type_name: &'static str) -> Self {
        Self { inner, wire_type_name, _marker: std::marker::PhantomData }
    }
}

impl<T, U, C> Converter<T> for NumericCoercionConverter<U, C>
where
    T: Copy + std::fmt::Debug + TryFrom<U> + Send + Sync + 'static,
    U: Copy + std::fmt::Debug + TryFrom<T> + Send + Sync + 'static,
    C: Converter<U>,
{
    fn can_convert(&self, format: DataFormat) -> bool {
        self.inner.can_convert(format)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        // Resolved open question (§9): "Extended on any inner Extended" is
        // the uniform forwarding rule, shared with the nullable decorator.
        DbNullPredicateKind::forward_from_inner(self.inner.db_null_predicate_kind())
    }

    fn is_db_null(&self, value: &T) -> bool {
        match U::try_from(*value) {
            Ok(u) => self.inner.is_db_null(&u),
            // An out-of-range value cannot be the inner's null sentinel.
            Err(_) => false,
        }
    }

    fn get_size(&self, ctx: &mut SizeContext, value: &T) -> Result<ValueSize> {
        let app_type = std::any::type_name::<T>();
        let u = U::try_from(*value).map_err(|_| ValueOutOfRange {
            app_type,
            wire_type: self.wire_type_name.into(),
            value: format!("{value:?}"),
        })?;

        let size = self.inner.get_size(ctx, &u)?;
        let inner_state = ctx.take_write_state();
        ctx.set_write_state(WriteState::new(CoercedState { value: u, inner: inner_state }));
        Ok(size)
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &T, state: &WriteState) -> Result<()> {
        match state.downcast_ref::<CoercedState<U>>() {
            Some(coerced) => self.inner.write(writer, &coerced.value, &coerced.inner),
            // Defensive fallback if `write` is ever invoked without the
            // matching `get_size` having run first.
            None => {
                let app_type = std::any::type_name::<T>();
                let u = U::try_from(*value).map_err(|_| ValueOutOfRange {
                    app_type,
                    wire_type: self.wire_type_name.into(),
                    value: format!("{value:?}"),
                })?;
                self.inner.write(writer, &u, &WriteState::none())
            }
        }
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &T,
        state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match state.downcast_ref::<CoercedState<U>>() {
            Some(coerced) => self.inner.write_async(writer, &coerced.value, &coerced.inner, cancel).await,
            None => {
                let app_type = std::any::type_name::<T>();
                let u = U::try_from(*value).map_err(|_| ValueOutOfRange {
                    app_type,
                    wire_type: self.wire_type_name.into(),
                    value: format!("{value:?}"),
                })?;
                self.inner.write_async(writer, &u, &WriteState::none(), cancel).await
            }
        }
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<T> {
        let u = self.inner.read(reader)?;
        T::try_from(u).map_err(|_| {
            ValueOutOfRange {
                app_type: std::any::type_name::<T>(),
                wire_type: self.wire_type_name.into(),
                value: format!("{u:?}"),
            }
            .into()
        })
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<T> {
        let u = self.inner.read_async(reader, cancel).await?;
        T::try_from(u).map_err(|_| {
            ValueOutOfRange {
                app_type: std::any::type_name::<T>(),
                wire_type: self.wire_type_name.into(),
                value: format!("{u:?}"),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{primitives::Primitive, test_support::write_then_read_back};

    #[test]
    fn in_range_i64_as_int4_matches_i32() {
        // Scenario B (§8): i64 = 42 through numeric coercion to int4.
        let converter = NumericCoercionConverter::new(Primitive::<i32>::new(), "int4");
        let bytes = write_then_read_back(&converter, &42i64, DataFormat::Binary);
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn out_of_range_fails_without_writing() {
        // Scenario C (§8).
        let converter = NumericCoercionConverter::new(Primitive::<i32>::new(), "int4");
        let mut ctx = crate::wire::SizeContext::new(DataFormat::Binary, 0);
        let err = converter.get_size(&mut ctx, &2_147_483_648i64).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::ValueOutOfRange(_)));
    }

    #[test]
    fn byte_coerces_via_int2() {
        let converter = NumericCoercionConverter::new(Primitive::<i16>::new(), "int2");
        let bytes = write_then_read_back(&converter, &200u8, DataFormat::Binary);
        assert_eq!(&bytes[..], &[0x00, 200]);
    }
}
