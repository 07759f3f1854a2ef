//! Supporting utility types and macros shared across the crate.
mod bytestr;
pub use bytestr::ByteStr;

/// Create a unit type implementing [`std::error::Error`].
///
/// # Example
///
/// ```ignore
/// unit_error! {
///     /// Writer was re-initialized before being reset.
///     pub struct ConcurrentUse("writer or reader is already in use");
/// }
/// ```
macro_rules! unit_error {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($msg:literal);) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq)]
        $vis struct $name;

        impl std::error::Error for $name { }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($msg)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

/// Trace when the `verbose` feature is enabled; otherwise expands to nothing.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*)
    };
}

/// Create and enter a `Span` when the `verbose` feature is enabled.
macro_rules! span {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        let s = tracing::trace_span!($($tt)*);
        #[cfg(feature = "verbose")]
        let _s = s.enter();
    };
}

pub(crate) use span;
pub(crate) use unit_error;
pub(crate) use verbose;
