//! The `jsonb` converter: a version-byte-prefixed binary envelope around
//! any `serde::Serialize + serde::de::DeserializeOwned` payload.
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{InvalidWireData, Result},
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// The `jsonb` wire format's leading format-version byte (Postgres has only
/// ever defined version `1`).
const JSONB_VERSION: u8 = 1;

/// Wraps an arbitrary serde-compatible value for encoding against `jsonb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Json<T>(pub T);

/// Converter for `Json<T>` against the `jsonb` wire type.
pub struct JsonConverter<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T> {
    pub const fn new() -> Self {
        Self { _marker: std::marker::PhantomData }
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Converter<Json<T>> for JsonConverter<T> {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &Json<T>) -> bool {
        false
    }

    fn get_size(&self, ctx: &mut SizeContext, value: &Json<T>) -> Result<ValueSize> {
        let body = serialize(value)?;
        let size = ValueSize::Exact(1 + body.len() as u32);
        ctx.set_write_state(WriteState::new(body));
        Ok(size)
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &Json<T>, state: &WriteState) -> Result<()> {
        writer.write_byte(JSONB_VERSION);
        match state.downcast_ref::<Vec<u8>>() {
            Some(body) => writer.write_raw(body),
            None => writer.write_raw(&serialize(value)?),
        }
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &Json<T>,
        state: &WriteState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        writer.write_byte(JSONB_VERSION);
        match state.downcast_ref::<Vec<u8>>() {
            Some(body) => writer.write_raw_async(body, cancel).await,
            None => writer.write_raw_async(&serialize(value)?, cancel).await,
        }
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<Json<T>> {
        let version = reader.read_byte()?;
        if version != JSONB_VERSION {
            return Err(InvalidWireData {
                wire_type: "jsonb".into(),
                reason: format!("unsupported jsonb version byte {version}").into(),
            }
            .into());
        }
        let n = reader.remaining();
        let body = reader.read_bytes(n)?;
        let value = serde_json::from_slice(body).map_err(|e| InvalidWireData {
            wire_type: "jsonb".into(),
            reason: e.to_string().into(),
        })?;
        Ok(Json(value))
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<Json<T>> {
        cancel.check()?;
        self.read(reader)
    }
}

fn serialize<T: Serialize>(value: &Json<T>) -> Result<Vec<u8>> {
    serde_json::to_vec(&value.0).map_err(|e| {
        InvalidWireData { wire_type: "jsonb".into(), reason: e.to_string().into() }.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn encodes_version_byte_then_json() {
        let converter = JsonConverter::<Point>::new();
        let bytes = write_then_read_back(&converter, &Json(Point { x: 1, y: 2 }), DataFormat::Binary);
        assert_eq!(bytes[0], JSONB_VERSION);
        assert_eq!(&bytes[1..], br#"{"x":1,"y":2}"#);
    }

    #[test]
    fn round_trips_through_read() {
        let converter = JsonConverter::<Point>::new();
        let bytes = write_then_read_back(&converter, &Json(Point { x: 3, y: 4 }), DataFormat::Binary);
        let mut reader = crate::convert::test_support::reader_for(bytes);
        assert_eq!(converter.read(&mut reader).unwrap().0, Point { x: 3, y: 4 });
    }

    #[test]
    fn rejects_unknown_version_byte() {
        let converter = JsonConverter::<Point>::new();
        let mut reader = crate::convert::test_support::reader_for(bytes::Bytes::from_static(b"\x02{}"));
        assert!(converter.read(&mut reader).is_err());
    }
}
