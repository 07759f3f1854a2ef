//! `postro-types` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt};

use crate::{config::ParseError, format::DataFormat, wire::FlushMode};

/// A specialized [`Result`] type for `postro-types` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from the `postro-types` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Attach a human-readable context prefix, e.g. the parameter index being bound.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// All possible error kinds from the `postro-types` library.
pub enum ErrorKind {
    Config(ParseError),
    /// Wire-type identity absent from the [`TypeCatalog`][crate::catalog::TypeCatalog].
    UnknownType(UnknownType),
    /// Converter asked to operate in a format it does not support.
    FormatNotSupported(FormatNotSupported),
    /// Numeric coercion or timestamp encoding out of representable range.
    ValueOutOfRange(ValueOutOfRange),
    /// Decode rejected the byte sequence.
    InvalidWireData(InvalidWireData),
    /// Writer or reader re-initialized before reset.
    ConcurrentUse(ConcurrentUse),
    /// Sync/async call made against a writer tagged for the other mode.
    WrongFlushMode(WrongFlushMode),
    /// No converter info could be produced for `(T, wire_type_id)`.
    ResolutionFailed(ResolutionFailed),
    /// An async operation observed a cancelled [`CancellationToken`][crate::wire::CancellationToken]
    /// at a suspension point.
    Cancelled(Cancelled),
}

/// Wire-type identity absent from the catalog.
pub struct UnknownType {
    pub wire_type: String,
}

/// Converter asked to operate in an unsupported [`DataFormat`].
pub struct FormatNotSupported {
    pub wire_type: String,
    pub format: DataFormat,
}

/// Numeric coercion or timestamp encoding out of representable range.
pub struct ValueOutOfRange {
    pub app_type: &'static str,
    pub wire_type: String,
    /// `Debug` rendering of the offending value, when safely loggable.
    pub value: String,
}

/// Decode rejected the byte sequence.
pub struct InvalidWireData {
    pub wire_type: String,
    pub reason: Cow<'static, str>,
}

crate::common::unit_error! {
    /// Writer or reader re-initialized before being reset.
    pub struct ConcurrentUse("writer or reader is already in use; call reset() first");
}

/// Sync/async call made against a writer tagged for the other flush mode.
pub struct WrongFlushMode {
    pub expected: FlushMode,
    pub found: FlushMode,
}

/// No [`ConverterInfo`][crate::info::ConverterInfo] could be produced for the given pair.
pub struct ResolutionFailed {
    pub app_type: Option<&'static str>,
    pub wire_type: Option<String>,
}

crate::common::unit_error! {
    /// Operation observed a cancelled token at a suspension point.
    pub struct Cancelled("operation cancelled");
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<UnknownType>e => ErrorKind::UnknownType(e));
from!(<FormatNotSupported>e => ErrorKind::FormatNotSupported(e));
from!(<ValueOutOfRange>e => ErrorKind::ValueOutOfRange(e));
from!(<InvalidWireData>e => ErrorKind::InvalidWireData(e));
from!(<ConcurrentUse>e => ErrorKind::ConcurrentUse(e));
from!(<WrongFlushMode>e => ErrorKind::WrongFlushMode(e));
from!(<ResolutionFailed>e => ErrorKind::ResolutionFailed(e));
from!(<Cancelled>e => ErrorKind::Cancelled(e));

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::UnknownType(e) => e.fmt(f),
            Self::FormatNotSupported(e) => e.fmt(f),
            Self::ValueOutOfRange(e) => e.fmt(f),
            Self::InvalidWireData(e) => e.fmt(f),
            Self::ConcurrentUse(e) => e.fmt(f),
            Self::WrongFlushMode(e) => e.fmt(f),
            Self::ResolutionFailed(e) => e.fmt(f),
            Self::Cancelled(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown wire type `{}`", self.wire_type)
    }
}

impl fmt::Display for FormatNotSupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire type `{}` does not support {:?} format", self.wire_type, self.format)
    }
}

impl fmt::Display for ValueOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value {} of type `{}` is out of range for wire type `{}`",
            self.value, self.app_type, self.wire_type,
        )
    }
}

impl fmt::Display for InvalidWireData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid wire data for `{}`: {}", self.wire_type, self.reason)
    }
}

impl fmt::Display for WrongFlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "writer is tagged {:?}, expected {:?}", self.found, self.expected)
    }
}

impl fmt::Display for ResolutionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.app_type, &self.wire_type) {
            (Some(t), Some(w)) => write!(f, "no converter resolves `{t}` to wire type `{w}`"),
            (Some(t), None) => write!(f, "no converter resolves application type `{t}`"),
            (None, Some(w)) => write!(f, "no converter resolves wire type `{w}`"),
            (None, None) => f.write_str("resolution requires an application type or a wire type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_context_prefix() {
        let err = Error::from(ErrorKind::ConcurrentUse(ConcurrentUse)).context("binding $1");
        assert!(err.to_string().starts_with("binding $1: "));
    }
}
