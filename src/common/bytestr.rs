use bytes::Bytes;

/// [`Bytes`] based string.
///
/// Cheaply cloneable, immutable string used for wire-type names and
/// configuration values that outlive the call that produced them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteStr {
    bytes: Bytes,
}

impl ByteStr {
    pub const fn from_static(s: &'static str) -> Self {
        Self { bytes: Bytes::from_static(s.as_bytes()) }
    }

    pub fn copy_from_str(s: &str) -> Self {
        Self { bytes: Bytes::copy_from_slice(s.as_bytes()) }
    }

    pub fn from_utf8(bytes: Bytes) -> Result<Self, std::str::Utf8Error> {
        std::str::from_utf8(&bytes)?;
        Ok(Self { bytes })
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: construction only ever accepts validated utf8.
        unsafe { std::str::from_utf8_unchecked(&self.bytes) }
    }

    /// Slice a substring still backed by the same allocation.
    pub fn slice_ref(&self, subset: &str) -> Self {
        Self { bytes: self.bytes.slice_ref(subset.as_bytes()) }
    }
}

impl std::ops::Deref for ByteStr {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl From<&str> for ByteStr {
    fn from(s: &str) -> Self {
        Self::copy_from_str(s)
    }
}

impl From<String> for ByteStr {
    fn from(s: String) -> Self {
        Self { bytes: Bytes::from(s.into_bytes()) }
    }
}

impl std::fmt::Display for ByteStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for ByteStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl PartialEq<str> for ByteStr {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialOrd for ByteStr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteStr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deref_and_eq() {
        let a = ByteStr::copy_from_str("int4");
        assert_eq!(&*a, "int4");
        assert_eq!(a, *"int4");
    }

    #[test]
    fn slice_ref_shares_allocation() {
        let a = ByteStr::copy_from_str("_int4");
        let b = a.slice_ref(&a["_".len()..]);
        assert_eq!(b.as_str(), "int4");
    }
}
