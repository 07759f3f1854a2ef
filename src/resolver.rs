//! The Resolver Chain: maps `(application type, wire type)` to a
//! [`ConverterInfo`] (§4.5).
//!
//! `Converter<T>` is deliberately not a trait object (its `write`/`read`
//! methods are generic over the writer/reader, and async fn in traits is
//! not dyn-compatible), so a single resolver cannot return one uniform
//! boxed type for every application type. Instead each supported `T` gets
//! its own [`ConverterInfoResolver<T>`] impl on [`DefaultResolver`] — the
//! "factory" for arrays and the nullable lift are expressed as blanket/
//! macro-generated impls, which is the sum-types-over-inheritance idiom
//! (§9) applied to resolution itself rather than a runtime factory list.
use crate::{
    catalog::{TypeCatalog, WireTypeId, WireTypeName},
    config::Config,
    convert::{ArrayConverter, ByteaConverter, CharConverter, Converter, NullableConverter, Primitive, TextConverter},
    error::{Result, ResolutionFailed},
    format::DataFormat,
    info::ConverterInfo,
};

#[cfg(feature = "time")]
use crate::convert::{Timestamp, TimestampConverter};

#[cfg(feature = "json")]
use crate::convert::{Json, JsonConverter};

/// A resolution policy mapping `(T, wire_type_id?)` to a [`ConverterInfo`].
///
/// At least one of `wire_type_id` or `T` itself (always known, being the
/// trait's type parameter) anchors a call; `wire_type_id = None` asks for
/// `T`'s canonical mapping.
pub trait ConverterInfoResolver<T> {
    type Converter: Converter<T>;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<T, Self::Converter>>;
}

/// The process's resolver: a [`TypeCatalog`] plus the [`Config`] flags a
/// few converters need at construction time (e.g. timestamp infinity
/// handling).
pub struct DefaultResolver {
    catalog: TypeCatalog,
    config: Config,
}

impl DefaultResolver {
    pub fn new(catalog: TypeCatalog, config: Config) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resolved_name(&self, id: &WireTypeId) -> Result<WireTypeName> {
        let name = match id {
            WireTypeId::Name(name) => Ok(name.clone()),
            WireTypeId::Oid(oid) => self.catalog.name_of(*oid),
        }?;
        crate::common::verbose!(requested = %id, resolved = %name, "resolved wire type name");
        Ok(name)
    }
}

/// Numeric converter for an application type that is itself one of
/// Postgres's three wire integer widths (`i16`/`i32`/`i64`).
///
/// An exact-width request is served directly by [`Primitive`] (§4.5 step 3,
/// "exact match: use the primitive integer converter for that width"); a
/// mismatched width wraps it in [`NumericCoercionConverter`] ("mismatch
/// within numeric family"). The `Primitive<T>: Converter<T>` bound below is
/// only satisfiable for the three native widths, which is exactly the set
/// this type is instantiated for.
pub enum NativeNumericConverter<T> {
    Exact(Primitive<T>),
    ToTwo(crate::convert::NumericCoercionConverter<T, Primitive<i16>>),
    ToFour(crate::convert::NumericCoercionConverter<T, Primitive<i32>>),
    ToEight(crate::convert::NumericCoercionConverter<T, Primitive<i64>>),
}

impl<T> Converter<T> for NativeNumericConverter<T>
where
    T: Copy + std::fmt::Debug + Send + Sync + 'static + TryFrom<i16> + TryFrom<i32> + TryFrom<i64>,
    i16: TryFrom<T>,
    i32: TryFrom<T>,
    i64: TryFrom<T>,
    Primitive<T>: Converter<T>,
{
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> crate::format::DbNullPredicateKind {
        match self {
            Self::Exact(c) => c.db_null_predicate_kind(),
            Self::ToTwo(c) => c.db_null_predicate_kind(),
            Self::ToFour(c) => c.db_null_predicate_kind(),
            Self::ToEight(c) => c.db_null_predicate_kind(),
        }
    }

    fn is_db_null(&self, value: &T) -> bool {
        match self {
            Self::Exact(c) => c.is_db_null(value),
            Self::ToTwo(c) => c.is_db_null(value),
            Self::ToFour(c) => c.is_db_null(value),
            Self::ToEight(c) => c.is_db_null(value),
        }
    }

    fn get_size(&self, ctx: &mut crate::wire::SizeContext, value: &T) -> Result<crate::format::ValueSize> {
        match self {
            Self::Exact(c) => c.get_size(ctx, value),
            Self::ToTwo(c) => c.get_size(ctx, value),
            Self::ToFour(c) => c.get_size(ctx, value),
            Self::ToEight(c) => c.get_size(ctx, value),
        }
    }

    fn write<W: crate::wire::PgWriter>(&self, writer: &mut W, value: &T, state: &crate::wire::WriteState) -> Result<()> {
        match self {
            Self::Exact(c) => c.write(writer, value, state),
            Self::ToTwo(c) => c.write(writer, value, state),
            Self::ToFour(c) => c.write(writer, value, state),
            Self::ToEight(c) => c.write(writer, value, state),
        }
    }

    async fn write_async<W: crate::wire::PgWriter>(
        &self,
        writer: &mut W,
        value: &T,
        state: &crate::wire::WriteState,
        cancel: &crate::wire::CancellationToken,
    ) -> Result<()> {
        match self {
            Self::Exact(c) => c.write_async(writer, value, state, cancel).await,
            Self::ToTwo(c) => c.write_async(writer, value, state, cancel).await,
            Self::ToFour(c) => c.write_async(writer, value, state, cancel).await,
            Self::ToEight(c) => c.write_async(writer, value, state, cancel).await,
        }
    }

    fn read<R: crate::wire::PgReader>(&self, reader: &mut R) -> Result<T> {
        match self {
            Self::Exact(c) => c.read(reader),
            Self::ToTwo(c) => c.read(reader),
            Self::ToFour(c) => c.read(reader),
            Self::ToEight(c) => c.read(reader),
        }
    }

    async fn read_async<R: crate::wire::PgReader>(&self, reader: &mut R, cancel: &crate::wire::CancellationToken) -> Result<T> {
        match self {
            Self::Exact(c) => c.read_async(reader, cancel).await,
            Self::ToTwo(c) => c.read_async(reader, cancel).await,
            Self::ToFour(c) => c.read_async(reader, cancel).await,
            Self::ToEight(c) => c.read_async(reader, cancel).await,
        }
    }
}

macro_rules! numeric_resolver_native {
    ($ty:ty, $canonical:literal) => {
        impl ConverterInfoResolver<$ty> for DefaultResolver {
            type Converter = NativeNumericConverter<$ty>;

            fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<$ty, NativeNumericConverter<$ty>>> {
                let requested = match wire_type_id {
                    Some(id) => id.clone(),
                    None => WireTypeId::name($canonical),
                };
                let name = self.resolved_name(&requested)?;
                let is_default = name.as_str() == $canonical;
                let converter = if is_default {
                    NativeNumericConverter::Exact(Primitive::<$ty>::new())
                } else {
                    match numeric_width(name.as_str(), stringify!($ty))? {
                        NumericWidth::Two => {
                            NativeNumericConverter::ToTwo(crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2"))
                        }
                        NumericWidth::Four => {
                            NativeNumericConverter::ToFour(crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4"))
                        }
                        NumericWidth::Eight => {
                            NativeNumericConverter::ToEight(crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8"))
                        }
                    }
                };
                Ok(ConverterInfo::new(converter, requested, DataFormat::Binary, is_default))
            }
        }
    };
}

numeric_resolver_native!(i16, "int2");
numeric_resolver_native!(i32, "int4");
numeric_resolver_native!(i64, "int8");

/// A small closed enum over Postgres's three binary integer widths, used by
/// application numeric types that have no native wire-width counterpart of
/// their own (e.g. `u8`) and therefore always resolve through the
/// numeric-coercion decorator, even when the requested width happens to be
/// their canonical one.
pub struct NumericConverter<T> {
    width: NumericWidth,
    _marker: std::marker::PhantomData<fn() -> T>,
}

#[derive(Clone, Copy)]
enum NumericWidth {
    Two,
    Four,
    Eight,
}

impl<T> NumericConverter<T> {
    fn new(width: NumericWidth) -> Self {
        Self { width, _marker: std::marker::PhantomData }
    }
}

impl<T> Converter<T> for NumericConverter<T>
where
    T: Copy + std::fmt::Debug + Send + Sync + 'static + TryFrom<i16> + TryFrom<i32> + TryFrom<i64>,
    i16: TryFrom<T>,
    i32: TryFrom<T>,
    i64: TryFrom<T>,
{
    fn can_convert(&self, format: DataFormat) -> bool {
        matches!(format, DataFormat::Binary)
    }

    fn db_null_predicate_kind(&self) -> crate::format::DbNullPredicateKind {
        crate::format::DbNullPredicateKind::None
    }

    fn is_db_null(&self, _value: &T) -> bool {
        false
    }

    fn get_size(&self, ctx: &mut crate::wire::SizeContext, value: &T) -> Result<crate::format::ValueSize> {
        match self.width {
            NumericWidth::Two => crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2").get_size(ctx, value),
            NumericWidth::Four => crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4").get_size(ctx, value),
            NumericWidth::Eight => crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8").get_size(ctx, value),
        }
    }

    fn write<W: crate::wire::PgWriter>(&self, writer: &mut W, value: &T, state: &crate::wire::WriteState) -> Result<()> {
        match self.width {
            NumericWidth::Two => crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2").write(writer, value, state),
            NumericWidth::Four => crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4").write(writer, value, state),
            NumericWidth::Eight => crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8").write(writer, value, state),
        }
    }

    async fn write_async<W: crate::wire::PgWriter>(
        &self,
        writer: &mut W,
        value: &T,
        state: &crate::wire::WriteState,
        cancel: &crate::wire::CancellationToken,
    ) -> Result<()> {
        match self.width {
            NumericWidth::Two => {
                crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2")
                    .write_async(writer, value, state, cancel)
                    .await
            }
            NumericWidth::Four => {
                crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4")
                    .write_async(writer, value, state, cancel)
                    .await
            }
            NumericWidth::Eight => {
                crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8")
                    .write_async(writer, value, state, cancel)
                    .await
            }
        }
    }

    fn read<R: crate::wire::PgReader>(&self, reader: &mut R) -> Result<T> {
        match self.width {
            NumericWidth::Two => crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2").read(reader),
            NumericWidth::Four => crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4").read(reader),
            NumericWidth::Eight => crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8").read(reader),
        }
    }

    async fn read_async<R: crate::wire::PgReader>(&self, reader: &mut R, cancel: &crate::wire::CancellationToken) -> Result<T> {
        match self.width {
            NumericWidth::Two => crate::convert::NumericCoercionConverter::new(Primitive::<i16>::new(), "int2").read_async(reader, cancel).await,
            NumericWidth::Four => crate::convert::NumericCoercionConverter::new(Primitive::<i32>::new(), "int4").read_async(reader, cancel).await,
            NumericWidth::Eight => crate::convert::NumericCoercionConverter::new(Primitive::<i64>::new(), "int8").read_async(reader, cancel).await,
        }
    }
}

fn numeric_width(name: &str, app_type: &'static str) -> Result<NumericWidth> {
    match name {
        "int2" => Ok(NumericWidth::Two),
        "int4" => Ok(NumericWidth::Four),
        "int8" => Ok(NumericWidth::Eight),
        other => Err(ResolutionFailed { app_type: Some(app_type), wire_type: Some(other.to_owned()) }.into()),
    }
}

macro_rules! numeric_resolver {
    ($ty:ty, $canonical:literal) => {
        impl ConverterInfoResolver<$ty> for DefaultResolver {
            type Converter = NumericConverter<$ty>;

            fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<$ty, NumericConverter<$ty>>> {
                let requested = match wire_type_id {
                    Some(id) => id.clone(),
                    None => WireTypeId::name($canonical),
                };
                let name = self.resolved_name(&requested)?;
                let is_default = name.as_str() == $canonical;
                let width = numeric_width(name.as_str(), stringify!($ty))?;
                Ok(ConverterInfo::new(NumericConverter::new(width), requested, DataFormat::Binary, is_default))
            }
        }
    };
}

numeric_resolver!(u8, "int2");

macro_rules! fixed_resolver {
    ($ty:ty, $canonical:literal, $converter:expr) => {
        impl ConverterInfoResolver<$ty> for DefaultResolver {
            type Converter = Primitive<$ty>;

            fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<$ty, Primitive<$ty>>> {
                let requested = match wire_type_id {
                    Some(id) => id.clone(),
                    None => WireTypeId::name($canonical),
                };
                let name = self.resolved_name(&requested)?;
                if name.as_str() != $canonical {
                    return Err(ResolutionFailed {
                        app_type: Some(stringify!($ty)),
                        wire_type: Some(name.as_str().to_owned()),
                    }
                    .into());
                }
                Ok(ConverterInfo::new($converter, requested, DataFormat::Binary, true))
            }
        }
    };
}

fixed_resolver!(bool, "bool", Primitive::<bool>::new());
fixed_resolver!(f32, "float4", Primitive::<f32>::new());
fixed_resolver!(f64, "float8", Primitive::<f64>::new());

impl ConverterInfoResolver<String> for DefaultResolver {
    type Converter = TextConverter;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<String, TextConverter>> {
        let requested = match wire_type_id {
            Some(id) => id.clone(),
            None => WireTypeId::name("text"),
        };
        let name = self.resolved_name(&requested)?;
        if name.as_str() != "text" {
            return Err(ResolutionFailed { app_type: Some("String"), wire_type: Some(name.as_str().to_owned()) }.into());
        }
        Ok(ConverterInfo::new(TextConverter, requested, DataFormat::Binary, true))
    }
}

impl ConverterInfoResolver<char> for DefaultResolver {
    type Converter = CharConverter;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<char, CharConverter>> {
        let requested = match wire_type_id {
            Some(id) => id.clone(),
            None => WireTypeId::name("text"),
        };
        let name = self.resolved_name(&requested)?;
        if name.as_str() != "text" {
            return Err(ResolutionFailed { app_type: Some("char"), wire_type: Some(name.as_str().to_owned()) }.into());
        }
        Ok(ConverterInfo::new(CharConverter, requested, DataFormat::Binary, true))
    }
}

impl ConverterInfoResolver<Vec<u8>> for DefaultResolver {
    type Converter = ByteaConverter;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<Vec<u8>, ByteaConverter>> {
        let requested = match wire_type_id {
            Some(id) => id.clone(),
            None => WireTypeId::name("bytea"),
        };
        let name = self.resolved_name(&requested)?;
        if name.as_str() != "bytea" {
            return Err(ResolutionFailed { app_type: Some("Vec<u8>"), wire_type: Some(name.as_str().to_owned()) }.into());
        }
        Ok(ConverterInfo::new(ByteaConverter, requested, DataFormat::Binary, true))
    }
}

/// Nullable lift as a blanket impl: any resolvable `T` makes `Option<T>`
/// resolvable too (§4.2).
impl<T> ConverterInfoResolver<Option<T>> for DefaultResolver
where
    DefaultResolver: ConverterInfoResolver<T>,
    T: Send + Sync + 'static,
{
    type Converter = NullableConverter<T, <DefaultResolver as ConverterInfoResolver<T>>::Converter>;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<Option<T>, Self::Converter>> {
        let inner = <Self as ConverterInfoResolver<T>>::resolve(self, wire_type_id)?;
        let wire_id = inner.preferred_wire_type_id().clone();
        let format = inner.preferred_format();
        let is_default = inner.is_default_mapping();
        Ok(ConverterInfo::new(NullableConverter::new(inner.into_converter()), wire_id, format, is_default))
    }
}

/// The array factory (§4.5 step 5), expressed per supported element type
/// rather than as a blanket over `Vec<T>` — a blanket here would collide
/// with [`Vec<u8>`]'s dedicated `bytea` mapping above under Rust's
/// coherence rules, since both patterns would match `Vec<u8>`.
macro_rules! array_resolver {
    ($elem:ty, $array_canonical:literal) => {
        impl ConverterInfoResolver<Vec<$elem>> for DefaultResolver {
            type Converter = ArrayConverter<$elem, <DefaultResolver as ConverterInfoResolver<$elem>>::Converter>;

            fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<Vec<$elem>, Self::Converter>> {
                let element = <Self as ConverterInfoResolver<$elem>>::resolve(self, None)?;
                let element_id = element.preferred_wire_type_id().clone();
                let array_id = self.catalog.array_of(&element_id)?;

                let array_name = self.resolved_name(&array_id)?;
                let is_default = match wire_type_id {
                    None => true,
                    Some(requested) => {
                        let requested_name = self.resolved_name(requested)?;
                        if requested_name != array_name {
                            return Err(ResolutionFailed {
                                app_type: Some(concat!("Vec<", stringify!($elem), ">")),
                                wire_type: Some(requested_name.as_str().to_owned()),
                            }
                            .into());
                        }
                        true
                    }
                };

                let converter = ArrayConverter::new(element.into_converter(), &self.catalog, &element_id)?;
                Ok(ConverterInfo::new(converter, array_id, DataFormat::Binary, is_default))
            }
        }
    };
}

array_resolver!(i16, "_int2");
array_resolver!(i32, "_int4");
array_resolver!(i64, "_int8");
array_resolver!(String, "_text");

#[cfg(feature = "time")]
impl ConverterInfoResolver<Timestamp> for DefaultResolver {
    type Converter = TimestampConverter;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<Timestamp, TimestampConverter>> {
        let requested = match wire_type_id {
            Some(id) => id.clone(),
            None => WireTypeId::name("timestamp"),
        };
        let name = self.resolved_name(&requested)?;
        if name.as_str() != "timestamp" {
            return Err(ResolutionFailed { app_type: Some("Timestamp"), wire_type: Some(name.as_str().to_owned()) }.into());
        }
        Ok(ConverterInfo::new(TimestampConverter::new(&self.config), requested, DataFormat::Binary, true))
    }
}

#[cfg(feature = "json")]
impl<T> ConverterInfoResolver<Json<T>> for DefaultResolver
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    type Converter = JsonConverter<T>;

    fn resolve(&self, wire_type_id: Option<&WireTypeId>) -> Result<ConverterInfo<Json<T>, JsonConverter<T>>> {
        let requested = match wire_type_id {
            Some(id) => id.clone(),
            None => WireTypeId::name("jsonb"),
        };
        let name = self.resolved_name(&requested)?;
        if name.as_str() != "jsonb" {
            return Err(ResolutionFailed { app_type: Some("Json<T>"), wire_type: Some(name.as_str().to_owned()) }.into());
        }
        Ok(ConverterInfo::new(JsonConverter::new(), requested, DataFormat::Binary, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::write_then_read_back;

    fn resolver() -> DefaultResolver {
        DefaultResolver::new(TypeCatalog::with_builtins(), Config::new())
    }

    #[test]
    fn i32_canonical_is_default_mapping() {
        let r = resolver();
        let info = <DefaultResolver as ConverterInfoResolver<i32>>::resolve(&r, None).unwrap();
        assert!(info.is_default_mapping());
        assert_eq!(info.preferred_wire_type_id(), &WireTypeId::name("int4"));
    }

    #[test]
    fn i64_to_int4_uses_coercion() {
        // Scenario B (§8).
        let r = resolver();
        let info =
            <DefaultResolver as ConverterInfoResolver<i64>>::resolve(&r, Some(&WireTypeId::name("int4"))).unwrap();
        assert!(!info.is_default_mapping());
        let bytes = write_then_read_back(info.converter(), &42i64, DataFormat::Binary);
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn byte_resolves_via_int2() {
        let r = resolver();
        let info = <DefaultResolver as ConverterInfoResolver<u8>>::resolve(&r, None).unwrap();
        assert_eq!(info.preferred_wire_type_id(), &WireTypeId::name("int2"));
    }

    #[test]
    fn option_i32_resolves_through_blanket() {
        let r = resolver();
        let info = <DefaultResolver as ConverterInfoResolver<Option<i32>>>::resolve(&r, None).unwrap();
        assert!(info.converter().is_db_null(&None));
    }

    #[test]
    fn text_array_resolves_to_underscore_text() {
        // Scenario E (§8).
        let r = resolver();
        let info = <DefaultResolver as ConverterInfoResolver<Vec<String>>>::resolve(&r, None).unwrap();
        assert_eq!(info.preferred_wire_type_id(), &WireTypeId::name("_text"));
        let bytes =
            write_then_read_back(info.converter(), &vec!["a".to_string(), "b".to_string()], DataFormat::Binary);
        assert!(bytes.len() > 12);
    }

    #[test]
    fn vec_u8_is_bytea_not_an_array() {
        let r = resolver();
        let info = <DefaultResolver as ConverterInfoResolver<Vec<u8>>>::resolve(&r, None).unwrap();
        assert_eq!(info.preferred_wire_type_id(), &WireTypeId::name("bytea"));
    }

    #[test]
    fn unresolvable_wire_name_fails() {
        let r = resolver();
        let err =
            <DefaultResolver as ConverterInfoResolver<i32>>::resolve(&r, Some(&WireTypeId::name("text"))).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::ResolutionFailed(_)));
    }
}
