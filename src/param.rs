//! The Parameter Writer: drives the two-phase size/write protocol for a
//! single bound parameter (§4.6).
use std::any::Any;

use crate::{
    catalog::WireTypeId,
    convert::Converter,
    error::{Result, WrongFlushMode},
    format::{DataFormat, ValueSize},
    info::{ConverterInfo, DynParameterConverter},
    wire::{CancellationToken, FlushMode, PgWriter, SizeContext, WriteState},
};

/// A single bound parameter, after phase 1 has run.
///
/// `size = None` means the value is SQL NULL: phase 2 writes nothing for
/// it, and the caller's own length-prefix field encodes the NULL.
pub struct Parameter {
    size: Option<ValueSize>,
    format: DataFormat,
    write_state: WriteState,
    wire_type_id: WireTypeId,
    is_db_null: bool,
}

impl Parameter {
    pub fn size(&self) -> Option<ValueSize> {
        self.size
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn wire_type_id(&self) -> &WireTypeId {
        &self.wire_type_id
    }

    pub fn is_db_null(&self) -> bool {
        self.is_db_null
    }
}

/// Phase 1 (sizing) for a statically-typed value: the application type `T`
/// is known at the call site, so `info.converter()` is invoked directly —
/// no indirect call (§9 "Avoiding virtual dispatch per value").
pub fn size_static<T, C: Converter<T>>(
    info: &ConverterInfo<T, C>,
    value: &T,
    buffer_length: usize,
    preferred_format: Option<DataFormat>,
) -> Result<Parameter> {
    let converter = info.converter();
    if converter.is_db_null(value) {
        return Ok(Parameter {
            size: None,
            format: info.preferred_format(),
            write_state: WriteState::none(),
            wire_type_id: info.preferred_wire_type_id().clone(),
            is_db_null: true,
        });
    }

    let resolution = info.get_resolution(value);
    let (size, write_state, format) = info.get_preferred_size(&resolution, value, buffer_length, preferred_format)?;
    Ok(Parameter {
        size: Some(size),
        format,
        write_state,
        wire_type_id: resolution.wire_type_id.clone(),
        is_db_null: false,
    })
}

/// Phase 2 (writing) for a statically-typed value, synchronous entry.
///
/// Rejects a writer tagged `NonBlocking`; skips entirely when the
/// parameter was recorded as SQL NULL in phase 1.
pub fn write_static<T, C, W>(info: &ConverterInfo<T, C>, writer: &mut W, value: &T, param: &Parameter) -> Result<()>
where
    C: Converter<T>,
    W: PgWriter,
{
    if writer.flush_mode() == FlushMode::NonBlocking {
        return Err(WrongFlushMode { expected: FlushMode::Blocking, found: FlushMode::NonBlocking }.into());
    }
    if param.is_db_null {
        return Ok(());
    }
    writer.set_current_format(param.format);
    info.converter().write(writer, value, &param.write_state)
}

/// Phase 2 (writing) for a statically-typed value, asynchronous entry.
pub async fn write_static_async<T, C, W>(
    info: &ConverterInfo<T, C>,
    writer: &mut W,
    value: &T,
    param: &Parameter,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: Converter<T>,
    W: PgWriter,
{
    if writer.flush_mode() == FlushMode::Blocking {
        return Err(WrongFlushMode { expected: FlushMode::NonBlocking, found: FlushMode::Blocking }.into());
    }
    if param.is_db_null {
        return Ok(());
    }
    writer.set_current_format(param.format);
    info.converter().write_async(writer, value, &param.write_state, cancel).await
}

/// Phase 1 (sizing) for a boxed/dynamic value, via the object-safe façade
/// rather than [`Converter`] directly (which is not dyn-compatible).
pub fn size_dynamic<W: PgWriter>(
    info: &dyn DynParameterConverter<W>,
    preferred_wire_type_id: WireTypeId,
    preferred_format: DataFormat,
    value: &dyn Any,
    buffer_length: usize,
) -> Result<Parameter> {
    if info.is_db_null_dyn(value)? {
        return Ok(Parameter {
            size: None,
            format: preferred_format,
            write_state: WriteState::none(),
            wire_type_id: preferred_wire_type_id,
            is_db_null: true,
        });
    }

    let mut ctx = SizeContext::new(preferred_format, buffer_length);
    let size = info.get_size_dyn(&mut ctx, value)?;
    let write_state = ctx.take_write_state();
    Ok(Parameter { size: Some(size), format: preferred_format, write_state, wire_type_id: preferred_wire_type_id, is_db_null: false })
}

/// Phase 2 (writing) for a boxed/dynamic value, synchronous entry.
pub fn write_dynamic<W: PgWriter>(
    info: &dyn DynParameterConverter<W>,
    writer: &mut W,
    value: &dyn Any,
    param: &Parameter,
) -> Result<()> {
    if writer.flush_mode() == FlushMode::NonBlocking {
        return Err(WrongFlushMode { expected: FlushMode::Blocking, found: FlushMode::NonBlocking }.into());
    }
    if param.is_db_null {
        return Ok(());
    }
    writer.set_current_format(param.format);
    info.write_dyn(writer, value, &param.write_state)
}

/// Phase 2 (writing) for a boxed/dynamic value, asynchronous entry.
pub async fn write_dynamic_async<W: PgWriter>(
    info: &dyn DynParameterConverter<W>,
    writer: &mut W,
    value: &dyn Any,
    param: &Parameter,
    cancel: &CancellationToken,
) -> Result<()> {
    if writer.flush_mode() == FlushMode::Blocking {
        return Err(WrongFlushMode { expected: FlushMode::NonBlocking, found: FlushMode::Blocking }.into());
    }
    if param.is_db_null {
        return Ok(());
    }
    writer.set_current_format(param.format);
    info.write_async_dyn(writer, value, &param.write_state, cancel).await
}

/// Buffered output capture (§4.6): runs both phases against a scratch
/// in-memory writer and returns the exact bytes produced, for callers that
/// cache a parameter's encoding (e.g. a prepared-statement parameter cache)
/// rather than streaming it straight to the socket.
pub fn capture_static<T, C: Converter<T>>(info: &ConverterInfo<T, C>, value: &T) -> Result<Option<bytes::Bytes>> {
    use crate::wire::MemoryWriter;

    let param = size_static(info, value, 0, None)?;
    if param.is_db_null {
        return Ok(None);
    }

    let mut scratch = MemoryWriter::new(FlushMode::Blocking);
    scratch.initialize()?;
    write_static(info, &mut scratch, value, &param)?;
    Ok(Some(scratch.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::WireTypeId,
        convert::Primitive,
        wire::{FlushMode, MemoryWriter},
    };

    fn sample_info() -> ConverterInfo<i32, Primitive<i32>> {
        ConverterInfo::new(Primitive::<i32>::new(), WireTypeId::name("int4"), DataFormat::Binary, true)
    }

    #[test]
    fn static_round_trip_writes_exact_bytes() {
        // Scenario A (§8).
        let info = sample_info();
        let param = size_static(&info, &42, 0, None).unwrap();
        assert_eq!(param.size(), Some(ValueSize::Exact(4)));

        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        writer.initialize().unwrap();
        write_static(&info, &mut writer, &42, &param).unwrap();
        assert_eq!(writer.as_slice(), &42i32.to_be_bytes());
    }

    #[test]
    fn null_value_skips_write_phase() {
        // Scenario D (§8).
        use crate::convert::NullableConverter;
        let info = ConverterInfo::new(
            NullableConverter::new(Primitive::<i32>::new()),
            WireTypeId::name("int4"),
            DataFormat::Binary,
            true,
        );
        let param = size_static(&info, &None, 0, None).unwrap();
        assert!(param.is_db_null());
        assert_eq!(param.size(), None);

        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        writer.initialize().unwrap();
        write_static(&info, &mut writer, &None, &param).unwrap();
        assert!(writer.as_slice().is_empty());
    }

    #[test]
    fn async_write_rejects_blocking_writer() {
        let info = sample_info();
        let param = size_static(&info, &42, 0, None).unwrap();
        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        writer.initialize().unwrap();
        let token = CancellationToken::new();

        let mut fut = Box::pin(write_static_async(&info, &mut writer, &42, &param, &token));
        let result = poll_once(fut.as_mut());
        assert!(result.is_err());
    }

    #[test]
    fn dynamic_entry_drives_same_bytes_as_static() {
        let info = sample_info();
        let boxed: Box<dyn Any> = Box::new(42i32);
        let facade: &dyn DynParameterConverter<MemoryWriter> = &info;
        let param = size_dynamic(facade, WireTypeId::name("int4"), DataFormat::Binary, boxed.as_ref(), 0).unwrap();

        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        writer.initialize().unwrap();
        write_dynamic(facade, &mut writer, boxed.as_ref(), &param).unwrap();
        assert_eq!(writer.as_slice(), &42i32.to_be_bytes());
    }

    #[test]
    fn capture_collects_bytes_for_null_as_none() {
        use crate::convert::NullableConverter;
        let info = ConverterInfo::new(
            NullableConverter::new(Primitive::<i32>::new()),
            WireTypeId::name("int4"),
            DataFormat::Binary,
            true,
        );
        assert_eq!(capture_static(&info, &None).unwrap(), None);
        assert_eq!(capture_static(&info, &Some(42)).unwrap().unwrap(), bytes::Bytes::from_static(&[0, 0, 0, 42]));
    }

    fn poll_once<F: std::future::Future>(fut: std::pin::Pin<&mut F>) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let waker = unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) };
        let mut cx = Context::from_waker(&waker);
        match fut.poll(&mut cx) {
            Poll::Ready(out) => out,
            Poll::Pending => panic!("future did not complete synchronously"),
        }
    }
}
