//! `ConverterInfo`: a converter paired with its negotiated wire identity,
//! plus the non-generic façade the dynamic (boxed-value) entry point uses
//! instead of making [`Converter`] itself a trait object (§4.3, §9
//! "Avoiding virtual dispatch per value").
use std::{any::Any, future::Future, marker::PhantomData, pin::Pin};

use crate::{
    catalog::WireTypeId,
    convert::Converter,
    error::{FormatNotSupported, Result, ResolutionFailed},
    format::{DataFormat, ValueSize},
    wire::{CancellationToken, PgWriter, SizeContext, WriteState},
};

/// The converter plus wire identity chosen for one resolution call.
///
/// Borrows the converter rather than cloning it — converters are immutable
/// and meant to be shared (§5).
pub struct ConverterResolution<'a, T, C> {
    pub converter: &'a C,
    pub wire_type_id: WireTypeId,
    _marker: PhantomData<fn() -> T>,
}

/// A converter bound to the wire identity and format it negotiated,
/// cache-keyed by `(application_type, wire_type_id)` at the call site.
pub struct ConverterInfo<T, C> {
    converter: C,
    preferred_wire_type_id: WireTypeId,
    preferred_format: DataFormat,
    is_default_mapping: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Converter<T>> ConverterInfo<T, C> {
    pub fn new(
        converter: C,
        preferred_wire_type_id: WireTypeId,
        preferred_format: DataFormat,
        is_default_mapping: bool,
    ) -> Self {
        Self { converter, preferred_wire_type_id, preferred_format, is_default_mapping, _marker: PhantomData }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn into_converter(self) -> C {
        self.converter
    }

    pub fn preferred_wire_type_id(&self) -> &WireTypeId {
        &self.preferred_wire_type_id
    }

    pub fn preferred_format(&self) -> DataFormat {
        self.preferred_format
    }

    pub fn is_default_mapping(&self) -> bool {
        self.is_default_mapping
    }

    /// Resolution for a statically-typed value (§4.3).
    pub fn get_resolution(&self, _value: &T) -> ConverterResolution<'_, T, C> {
        ConverterResolution {
            converter: &self.converter,
            wire_type_id: self.preferred_wire_type_id.clone(),
            _marker: PhantomData,
        }
    }

    /// Resolution for a boxed/dynamic value; fails with `resolution_failed`
    /// if `value`'s concrete type does not match `T`.
    pub fn get_resolution_as_object(&self, value: &dyn Any) -> Result<ConverterResolution<'_, T, C>>
    where
        T: 'static,
    {
        value
            .downcast_ref::<T>()
            .map(|v| self.get_resolution(v))
            .ok_or_else(|| {
                ResolutionFailed {
                    app_type: Some(std::any::type_name::<T>()),
                    wire_type: Some(self.preferred_wire_type_id.to_string()),
                }
                .into()
            })
    }

    /// Negotiates a format (preferring `hint`, falling back to this info's
    /// preferred format), then runs the size phase (§4.3, §8 property 6).
    pub fn get_preferred_size(
        &self,
        resolution: &ConverterResolution<'_, T, C>,
        value: &T,
        buffer_length: usize,
        preferred_format: Option<DataFormat>,
    ) -> Result<(ValueSize, WriteState, DataFormat)> {
        let format = self.negotiate_format(preferred_format.unwrap_or(self.preferred_format))?;
        let mut ctx = SizeContext::new(format, buffer_length);
        let size = resolution.converter.get_size(&mut ctx, value)?;
        Ok((size, ctx.take_write_state(), format))
    }

    fn negotiate_format(&self, hint: DataFormat) -> Result<DataFormat> {
        if self.converter.can_convert(hint) {
            return Ok(hint);
        }
        crate::common::verbose!(wire_type = %self.preferred_wire_type_id, requested = ?hint, falling_back_to = ?self.preferred_format, "format not supported, falling back");
        if self.converter.can_convert(self.preferred_format) {
            return Ok(self.preferred_format);
        }
        Err(FormatNotSupported { wire_type: self.preferred_wire_type_id.to_string(), format: hint }.into())
    }
}

/// Object-safe façade for the dynamic entry point (§4.6 "static vs dynamic
/// dispatch"). Parameterized by the (statically known) writer type `W`
/// rather than by the application type `T`, so `Box<dyn DynParameterConverter<W>>`
/// is constructible despite [`Converter`] itself never being made into a
/// trait object.
pub trait DynParameterConverter<W: PgWriter>: Send + Sync {
    fn is_db_null_dyn(&self, value: &dyn Any) -> Result<bool>;
    fn get_size_dyn(&self, ctx: &mut SizeContext, value: &dyn Any) -> Result<ValueSize>;
    fn write_dyn(&self, writer: &mut W, value: &dyn Any, state: &WriteState) -> Result<()>;

    fn write_async_dyn<'a>(
        &'a self,
        writer: &'a mut W,
        value: &'a dyn Any,
        state: &'a WriteState,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl<T, C, W> DynParameterConverter<W> for ConverterInfo<T, C>
where
    T: Send + Sync + 'static,
    C: Converter<T>,
    W: PgWriter,
{
    fn is_db_null_dyn(&self, value: &dyn Any) -> Result<bool> {
        Ok(self.converter.is_db_null(downcast::<T>(value)?))
    }

    fn get_size_dyn(&self, ctx: &mut SizeContext, value: &dyn Any) -> Result<ValueSize> {
        self.converter.get_size(ctx, downcast::<T>(value)?)
    }

    fn write_dyn(&self, writer: &mut W, value: &dyn Any, state: &WriteState) -> Result<()> {
        self.converter.write(writer, downcast::<T>(value)?, state)
    }

    fn write_async_dyn<'a>(
        &'a self,
        writer: &'a mut W,
        value: &'a dyn Any,
        state: &'a WriteState,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let value = downcast::<T>(value)?;
            self.converter.write_async(writer, value, state, cancel).await
        })
    }
}

fn downcast<T: 'static>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        ResolutionFailed { app_type: Some(std::any::type_name::<T>()), wire_type: None }.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{convert::Primitive, wire::{MemoryWriter, PgWriter}};

    fn sample_info() -> ConverterInfo<i32, Primitive<i32>> {
        ConverterInfo::new(Primitive::<i32>::new(), WireTypeId::name("int4"), DataFormat::Binary, true)
    }

    #[test]
    fn static_resolution_round_trips() {
        let info = sample_info();
        let resolution = info.get_resolution(&42);
        let (size, _state, format) = info.get_preferred_size(&resolution, &42, 0, None).unwrap();
        assert_eq!(size, ValueSize::Exact(4));
        assert_eq!(format, DataFormat::Binary);
    }

    #[test]
    fn dynamic_resolution_rejects_wrong_type() {
        let info = sample_info();
        let boxed: Box<dyn Any> = Box::new("not an i32".to_string());
        assert!(info.get_resolution_as_object(boxed.as_ref()).is_err());
    }

    #[test]
    fn format_negotiation_falls_back_to_preferred() {
        let info = sample_info();
        let err = info.negotiate_format(DataFormat::Text).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::FormatNotSupported(_)));
    }

    #[test]
    fn dyn_facade_drives_a_real_writer() {
        let info = sample_info();
        let boxed: Box<dyn Any> = Box::new(42i32);
        let mut ctx = SizeContext::new(DataFormat::Binary, 0);
        let size = DynParameterConverter::<MemoryWriter>::get_size_dyn(&info, &mut ctx, boxed.as_ref()).unwrap();
        assert_eq!(size, ValueSize::Exact(4));

        let mut writer = MemoryWriter::new(crate::wire::FlushMode::Blocking);
        writer.initialize().unwrap();
        DynParameterConverter::write_dyn(&info, &mut writer, boxed.as_ref(), &WriteState::none()).unwrap();
        assert_eq!(writer.as_slice(), &42i32.to_be_bytes());
    }
}
