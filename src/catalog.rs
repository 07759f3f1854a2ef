//! Wire-type identity and the per-session catalog that maps it to OIDs.
use std::collections::HashMap;

use crate::{
    common::ByteStr,
    error::{Error, UnknownType},
};

/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer and is only
/// meaningful within the session that produced it.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// Stable, session-independent identifier for a wire type, e.g. `int4`, `text`, `_int4`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireTypeName(ByteStr);

impl WireTypeName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(ByteStr::from_static(name))
    }

    pub fn new(name: impl Into<ByteStr>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for WireTypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WireTypeName({:?})", self.0.as_str())
    }
}

impl std::fmt::Display for WireTypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Either a stable [`WireTypeName`] or a per-session [`Oid`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireTypeId {
    Name(WireTypeName),
    Oid(Oid),
}

impl WireTypeId {
    pub fn name(name: &'static str) -> Self {
        Self::Name(WireTypeName::from_static(name))
    }
}

impl From<WireTypeName> for WireTypeId {
    fn from(name: WireTypeName) -> Self {
        Self::Name(name)
    }
}

impl From<Oid> for WireTypeId {
    fn from(oid: Oid) -> Self {
        Self::Oid(oid)
    }
}

impl std::fmt::Display for WireTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => name.fmt(f),
            Self::Oid(oid) => write!(f, "oid({oid})"),
        }
    }
}

/// A Rust type with a default (canonical) wire-type identity.
///
/// Unlike a compile-time OID, `WIRE_TYPE` is a stable name: the numeric OID it
/// resolves to is only known once a [`TypeCatalog`] has been populated for the
/// current session, so converters must never bake an `Oid` in at compile time.
pub trait PgType {
    const WIRE_TYPE: WireTypeName;
}

macro_rules! wire_type {
    ($ty:ty, $name:literal $(, $doc:literal)?) => {
        impl $crate::catalog::PgType for $ty {
            $(#[doc = $doc])?
            const WIRE_TYPE: $crate::catalog::WireTypeName = $crate::catalog::WireTypeName::from_static($name);
        }
    };
}
pub(crate) use wire_type;

wire_type!(bool, "bool");
wire_type!(i16, "int2", "-32 thousand to 32 thousand, 2-byte storage");
wire_type!(i32, "int4", "-2 billion to 2 billion integer, 4-byte storage");
wire_type!(i64, "int8", "~18 digit integer, 8-byte storage");
wire_type!(f32, "float4", "single-precision floating point number, 4-byte storage");
wire_type!(f64, "float8", "double-precision floating point number, 8-byte storage");
wire_type!(str, "text", "variable-length string, no limit specified");
wire_type!(String, "text", "variable-length string, no limit specified");
wire_type!(Vec<u8>, "bytea", "variable-length byte array");

/// Per-session bidirectional mapping between [`WireTypeName`] and [`Oid`].
///
/// Read-only after the session handshake populates it; safe for concurrent
/// reads. Converters must resolve through this catalog at write time rather
/// than caching an `Oid`.
#[derive(Clone, Debug, Default)]
pub struct TypeCatalog {
    by_name: HashMap<WireTypeName, Oid>,
    by_oid: HashMap<Oid, WireTypeName>,
    array_of: HashMap<WireTypeName, WireTypeName>,
}

impl TypeCatalog {
    /// An empty catalog; every lookup fails with `unknown_type` until
    /// [`TypeCatalog::insert`] is called, as happens during the real
    /// session handshake (out of scope here).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog seeded with the well-known builtin OIDs, usable without a
    /// live handshake (e.g. in tests, or for a single hardcoded session).
    pub fn with_builtins() -> Self {
        let mut catalog = Self::empty();
        for &(name, oid, array_name, array_oid) in BUILTINS {
            catalog.insert(WireTypeName::from_static(name), oid);
            catalog.insert(WireTypeName::from_static(array_name), array_oid);
            catalog.set_array_of(WireTypeName::from_static(name), WireTypeName::from_static(array_name));
        }
        catalog
    }

    pub fn insert(&mut self, name: WireTypeName, oid: Oid) {
        self.by_oid.insert(oid, name.clone());
        self.by_name.insert(name, oid);
    }

    pub fn set_array_of(&mut self, element: WireTypeName, array: WireTypeName) {
        self.array_of.insert(element, array);
    }

    /// Resolve a [`WireTypeId`] to the session's `Oid`; a pass-through for
    /// [`WireTypeId::Oid`].
    pub fn oid_of(&self, id: &WireTypeId) -> Result<Oid, Error> {
        match id {
            WireTypeId::Oid(oid) => Ok(*oid),
            WireTypeId::Name(name) => {
                self.by_name.get(name).copied().ok_or_else(|| {
                    UnknownType { wire_type: name.as_str().to_owned() }.into()
                })
            }
        }
    }

    /// Reverse lookup: the stable name for a session `Oid`.
    pub fn name_of(&self, oid: Oid) -> Result<WireTypeName, Error> {
        self.by_oid.get(&oid).cloned().ok_or_else(|| {
            UnknownType { wire_type: format!("oid({oid})") }.into()
        })
    }

    /// The array wire type for a given element wire type.
    pub fn array_of(&self, element: &WireTypeId) -> Result<WireTypeId, Error> {
        let name = match element {
            WireTypeId::Name(name) => name.clone(),
            WireTypeId::Oid(oid) => self.name_of(*oid)?,
        };
        self.array_of
            .get(&name)
            .cloned()
            .map(WireTypeId::Name)
            .ok_or_else(|| UnknownType { wire_type: format!("{name}[]") }.into())
    }
}

type Builtin = (&'static str, Oid, &'static str, Oid);

const BUILTINS: &[Builtin] = &[
    ("bool", 16, "_bool", 1000),
    ("bytea", 17, "_bytea", 1001),
    ("int8", 20, "_int8", 1016),
    ("int2", 21, "_int2", 1005),
    ("int4", 23, "_int4", 1007),
    ("text", 25, "_text", 1009),
    ("json", 114, "_json", 199),
    ("float4", 700, "_float4", 1021),
    ("float8", 701, "_float8", 1022),
    ("timestamp", 1114, "_timestamp", 1115),
    ("timestamptz", 1184, "_timestamptz", 1185),
    ("jsonb", 3802, "_jsonb", 3807),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_round_trip() {
        let catalog = TypeCatalog::with_builtins();
        let oid = catalog.oid_of(&WireTypeId::name("int4")).unwrap();
        assert_eq!(oid, 23);
        assert_eq!(catalog.name_of(oid).unwrap().as_str(), "int4");
    }

    #[test]
    fn oid_passes_through() {
        let catalog = TypeCatalog::empty();
        assert_eq!(catalog.oid_of(&WireTypeId::Oid(9999)).unwrap(), 9999);
    }

    #[test]
    fn unknown_name_fails() {
        let catalog = TypeCatalog::empty();
        assert!(catalog.oid_of(&WireTypeId::name("int4")).is_err());
    }

    #[test]
    fn array_lookup() {
        let catalog = TypeCatalog::with_builtins();
        let array = catalog.array_of(&WireTypeId::name("text")).unwrap();
        assert_eq!(array, WireTypeId::name("_text"));
    }

    #[test]
    fn catalog_independence() {
        // Converter behavior (property 8, §8) must not depend on the actual
        // numeric Oid assigned to a name, only on the name itself.
        let mut a = TypeCatalog::empty();
        a.insert(WireTypeName::from_static("int4"), 23);
        let mut b = TypeCatalog::empty();
        b.insert(WireTypeName::from_static("int4"), 999_999);

        assert_eq!(a.name_of(a.oid_of(&WireTypeId::name("int4")).unwrap()).unwrap().as_str(), "int4");
        assert_eq!(b.name_of(b.oid_of(&WireTypeId::name("int4")).unwrap()).unwrap().as_str(), "int4");
    }
}
