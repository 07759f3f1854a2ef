//! The nullable-lift decorator: `Converter<U> -> Converter<Option<U>>`.
use crate::{
    error::Result,
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// Lifts a non-nullable `Converter<U>` to `Converter<Option<U>>`.
///
/// `None -> db_null`; `Some(u) -> inner(u)`. Forwards `can_convert` from the
/// inner converter unchanged (§3 "Decorators forward can_convert... unless
/// explicitly overridden").
pub struct NullableConverter<U, C> {
    inner: C,
    _marker: std::marker::PhantomData<fn() -> U>,
}

impl<U, C: Converter<U>> NullableConverter<U, C> {
    pub fn new(inner: C) -> Self {
        Self { inner, _marker: std::marker::PhantomData }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<U: Send + Sync, C: Converter<U>> Converter<Option<U>> for NullableConverter<U, C> {
    fn can_convert(&self, format: DataFormat) -> bool {
        self.inner.can_convert(format)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::lift_to_nullable(self.inner.db_null_predicate_kind())
    }

    fn is_db_null(&self, value: &Option<U>) -> bool {
        match value {
            None => true,
            Some(u) => self.inner.is_db_null(u),
        }
    }

    fn get_size(&self, ctx: &mut SizeContext, value: &Option<U>) -> Result<ValueSize> {
        match value {
            // The parameter writer never calls `get_size` when `is_db_null`
            // is true (§4.1); this arm only guards against misuse.
            None => Ok(ValueSize::Exact(0)),
            Some(u) => self.inner.get_size(ctx, u),
        }
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &Option<U>, state: &WriteState) -> Result<()> {
        match value {
            None => Ok(()),
            Some(u) => self.inner.write(writer, u, state),
        }
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &Option<U>,
        state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match value {
            None => Ok(()),
            Some(u) => self.inner.write_async(writer, u, state, cancel).await,
        }
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<Option<U>> {
        self.inner.read(reader).map(Some)
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<Option<U>> {
        self.inner.read_async(reader, cancel).await.map(Some)
    }

    fn null_value(&self) -> Option<Option<U>> {
        Some(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{primitives::Primitive, test_support::write_then_read_back};

    #[test]
    fn none_is_db_null() {
        let converter = NullableConverter::new(Primitive::<i32>::new());
        assert!(converter.is_db_null(&None));
        assert!(!converter.is_db_null(&Some(1)));
    }

    #[test]
    fn some_is_byte_identical_to_inner() {
        // Decorator transparency, property 4 (§8).
        let inner = Primitive::<i32>::new();
        let lifted = NullableConverter::new(Primitive::<i32>::new());

        let plain = write_then_read_back(&inner, &42, DataFormat::Binary);
        let wrapped = write_then_read_back(&lifted, &Some(42), DataFormat::Binary);
        assert_eq!(plain, wrapped);
    }

    #[test]
    fn predicate_kind_floor_is_default() {
        let converter = NullableConverter::new(Primitive::<i32>::new());
        assert_eq!(converter.db_null_predicate_kind(), DbNullPredicateKind::Default);
    }
}
