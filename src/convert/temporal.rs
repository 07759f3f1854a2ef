//! The `timestamp` converter: binary encoding as `i64` microseconds since
//! 2000-01-01 00:00:00, with a config-gated ±infinity sentinel (§6, §8
//! scenario F).
use crate::{
    catalog::PgType,
    config::Config,
    error::{InvalidWireData, Result, ValueOutOfRange},
    format::{DataFormat, DbNullPredicateKind, ValueSize},
    wire::{CancellationToken, PgReader, PgWriter, SizeContext, WriteState},
};

use super::Converter;

/// A naive (timezone-less) Postgres `timestamp` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp(pub time::PrimitiveDateTime);

crate::catalog::wire_type!(Timestamp, "timestamp");

fn pg_epoch() -> time::PrimitiveDateTime {
    // 2000-01-01, Postgres's own timestamp epoch.
    let date = time::Date::from_julian_day(2_451_545).expect("2000-01-01 is a valid Julian day");
    time::PrimitiveDateTime::new(date, time::Time::MIDNIGHT)
}

/// Converter for [`Timestamp`] against the `timestamp` wire type.
///
/// The ±infinity sentinel (`i64::MIN`/`i64::MAX`) is only honored when
/// constructed with `enable_infinity_conversions` set; otherwise those raw
/// values decode as `invalid_wire_data` and the application's own max/min
/// date values encode as their literal (very large) microsecond offsets.
pub struct TimestampConverter {
    enable_infinity: bool,
}

impl TimestampConverter {
    pub fn new(config: &Config) -> Self {
        Self { enable_infinity: config.is_infinity_conversions_enabled() }
    }
}

impl TimestampConverter {
    fn encode(&self, value: &Timestamp) -> Result<i64> {
        if self.enable_infinity {
            if value.0 == time::PrimitiveDateTime::MAX {
                return Ok(i64::MAX);
            }
            if value.0 == time::PrimitiveDateTime::MIN {
                return Ok(i64::MIN);
            }
        }

        let delta = value.0 - pg_epoch();
        i64::try_from(delta.whole_microseconds()).map_err(|_| {
            ValueOutOfRange {
                app_type: "Timestamp",
                wire_type: "timestamp".into(),
                value: format!("{:?}", value.0),
            }
            .into()
        })
    }

    fn decode(&self, raw: i64) -> Result<Timestamp> {
        if raw == i64::MAX || raw == i64::MIN {
            if !self.enable_infinity {
                return Err(InvalidWireData {
                    wire_type: "timestamp".into(),
                    reason: "reserved infinity sentinel without enable_infinity_conversions".into(),
                }
                .into());
            }
            return Ok(Timestamp(if raw == i64::MAX { time::PrimitiveDateTime::MAX } else { time::PrimitiveDateTime::MIN }));
        }

        let dt = pg_epoch() + time::Duration::microseconds(raw);
        Ok(Timestamp(dt))
    }
}

impl Converter<Timestamp> for TimestampConverter {
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> DbNullPredicateKind {
        DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &Timestamp) -> bool {
        false
    }

    fn get_size(&self, _ctx: &mut SizeContext, value: &Timestamp) -> Result<ValueSize> {
        self.encode(value)?;
        Ok(ValueSize::Exact(8))
    }

    fn write<W: PgWriter>(&self, writer: &mut W, value: &Timestamp, _state: &WriteState) -> Result<()> {
        writer.write_i64(self.encode(value)?);
        Ok(())
    }

    async fn write_async<W: PgWriter>(
        &self,
        writer: &mut W,
        value: &Timestamp,
        state: &WriteState,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.write(writer, value, state)
    }

    fn read<R: PgReader>(&self, reader: &mut R) -> Result<Timestamp> {
        self.decode(reader.read_i64()?)
    }

    async fn read_async<R: PgReader>(&self, reader: &mut R, cancel: &CancellationToken) -> Result<Timestamp> {
        cancel.check()?;
        self.read(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    fn ymd(y: i32, m: u8, d: u8) -> time::PrimitiveDateTime {
        let date = time::Date::from_calendar_date(y, time::Month::try_from(m).unwrap(), d).unwrap();
        time::PrimitiveDateTime::new(date, time::Time::MIDNIGHT)
    }

    #[test]
    fn epoch_round_trips_to_zero() {
        let converter = TimestampConverter::new(&Config::new());
        let bytes = write_then_read_back(&converter, &Timestamp(ymd(2000, 1, 1)), DataFormat::Binary);
        assert_eq!(&bytes[..], &0i64.to_be_bytes());
    }

    #[test]
    fn infinity_encodes_to_max_sentinel_when_enabled() {
        // Scenario F (§8).
        let config = Config::new().enable_infinity_conversions(true);
        let converter = TimestampConverter::new(&config);
        let bytes = write_then_read_back(&converter, &Timestamp(time::PrimitiveDateTime::MAX), DataFormat::Binary);
        assert_eq!(&bytes[..], &[0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn decoding_sentinel_fails_when_disabled() {
        let converter = TimestampConverter::new(&Config::new());
        let mut reader = crate::convert::test_support::reader_for(bytes::Bytes::from_static(&[
            0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ]));
        let err = converter.read(&mut reader).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::InvalidWireData(_)));
    }
}
