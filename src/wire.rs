//! The wire reader/writer contracts converters are built against, plus an
//! in-memory reference implementation used by this crate's own tests.
//!
//! The real framed socket reader/writer (buffering, TCP flushing, the
//! startup handshake) is an out-of-scope collaborator (§1); what lives here
//! is the minimal surface converters actually call.
use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    catalog::{TypeCatalog, WireTypeId},
    error::{Cancelled, ConcurrentUse, Result, WrongFlushMode},
    format::DataFormat,
};

/// Whether, and how, a writer may flush buffered bytes downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushMode {
    /// No flushing permitted; bytes only accumulate (e.g. parameter caching).
    None,
    /// Flushing is synchronous.
    Blocking,
    /// Flushing is asynchronous.
    NonBlocking,
}

/// Cooperative cancellation signal threaded through every async entry point.
///
/// Checked only at suspension points (§5); cheap to clone and share.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(Cancelled.into()) } else { Ok(()) }
    }
}

/// Opaque scratch produced by `get_size` and consumed by `write`.
///
/// A converter may stash anything `'static + Send + Sync` here; most
/// fixed-width converters never populate it.
#[derive(Default)]
pub struct WriteState(Option<Box<dyn Any + Send + Sync>>);

impl WriteState {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref()
    }
}

impl std::fmt::Debug for WriteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WriteState").field(&self.0.is_some()).finish()
    }
}

/// Transient context passed to `get_size`.
pub struct SizeContext {
    pub buffer_length: usize,
    pub format: DataFormat,
    pub write_state_out: Option<WriteState>,
}

impl SizeContext {
    pub fn new(format: DataFormat, buffer_length: usize) -> Self {
        Self { buffer_length, format, write_state_out: None }
    }

    pub fn set_write_state(&mut self, state: WriteState) {
        self.write_state_out = Some(state);
    }

    /// Take the recorded write state, defaulting to an empty one.
    pub fn take_write_state(&mut self) -> WriteState {
        self.write_state_out.take().unwrap_or_else(WriteState::none)
    }
}

/// The wire writer contract consumed by converters.
///
/// Exactly one logical flow mutates a writer at a time; `initialize` then
/// `use` then `reset` enforces single-use (§5).
pub trait PgWriter {
    fn write_byte(&mut self, value: u8);
    fn write_i16(&mut self, value: i16);
    fn write_i32(&mut self, value: i32);
    fn write_i64(&mut self, value: i64);
    fn write_u32(&mut self, value: u32);

    /// Writes UTF-8 bytes without a length prefix; the caller owns framing.
    fn write_text(&mut self, text: &str);

    /// Suspendable variant of [`PgWriter::write_text`]. Writes starting at byte
    /// offset `resume_at`; returns `Some(next_offset)` if the internal chunk
    /// limit was hit before the whole string was written, `None` once done.
    fn write_text_resumable(&mut self, text: &str, resume_at: usize) -> Option<usize>;

    /// Appends a possibly large byte sequence.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Asynchronous twin of [`PgWriter::write_raw`]; may suspend between
    /// segments at `flush_async` boundaries, checking `cancel` each time.
    async fn write_raw_async(&mut self, bytes: &[u8], cancel: &CancellationToken) -> Result<()>;

    /// Resolves `id` through `catalog` and writes the resulting [`Oid`][crate::catalog::Oid].
    fn write_as_oid(&mut self, catalog: &TypeCatalog, id: &WireTypeId) -> Result<()>;

    fn current_format(&self) -> DataFormat;
    fn set_current_format(&mut self, format: DataFormat);

    fn flush_mode(&self) -> FlushMode;
    fn flush(&mut self) -> Result<()>;
    async fn flush_async(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Begins a single-use flow; fails with `concurrent_use` if already initialized.
    fn initialize(&mut self) -> Result<()>;
    /// Ends the current flow, permitting a future `initialize`.
    fn reset(&mut self);
}

/// The wire reader contract consumed by converters.
pub trait PgReader {
    fn read_byte(&mut self) -> Result<u8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_u32(&mut self) -> Result<u32>;

    /// A span borrowed from the reader's internal buffer, valid until the
    /// next call on this reader.
    fn read_bytes(&mut self, n: usize) -> Result<&[u8]>;

    /// Bytes currently buffered for the value being decoded. Each Postgres
    /// `DataRow` column arrives as `{length, bytes}` with the bytes already
    /// fully present, so variable-length converters (`text`, `bytea`) use
    /// this to consume exactly their value's span without being told `n`
    /// out of band by the (out-of-scope) result-decoding layer.
    fn remaining(&self) -> usize;

    /// Suspends until at least `n` unread bytes are available, checking
    /// `cancel` at the suspension point; the only async primitive a reader
    /// needs, per the buffered-converter pattern (§4.1, §5).
    async fn fill_async(&mut self, n: usize, cancel: &CancellationToken) -> Result<()>;

    fn initialize(&mut self) -> Result<()>;
    fn reset(&mut self);
}

/// Segment size for chunked writes (`write_text_resumable`, `write_raw`),
/// keeping any single append (and thus the pre-flush buffer growth) bounded.
const CHUNK_SIZE: usize = 8 * 1024;

/// In-memory [`PgWriter`] backed by [`BytesMut`], used by this crate's tests
/// and suitable as a buffered-output-capture target (§4.6).
pub struct MemoryWriter {
    buf: BytesMut,
    format: DataFormat,
    flush_mode: FlushMode,
    initialized: bool,
    pub(crate) flush_count: usize,
}

impl MemoryWriter {
    pub fn new(flush_mode: FlushMode) -> Self {
        Self { buf: BytesMut::new(), format: DataFormat::Binary, flush_mode, initialized: false, flush_count: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl PgWriter for MemoryWriter {
    fn write_byte(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    fn write_text(&mut self, text: &str) {
        self.buf.put_slice(text.as_bytes());
    }

    fn write_text_resumable(&mut self, text: &str, resume_at: usize) -> Option<usize> {
        let bytes = text.as_bytes();
        let end = (resume_at + CHUNK_SIZE).min(bytes.len());
        self.buf.put_slice(&bytes[resume_at..end]);
        if end < bytes.len() { Some(end) } else { None }
    }

    /// Copies `bytes` in `CHUNK_SIZE` segments, flushing between segments
    /// whenever the buffer has grown past `CHUNK_SIZE` and `flush_mode`
    /// permits a synchronous flush; keeps a single large value (`bytea`,
    /// `jsonb`, an array of large elements) from growing `buf` unbounded.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        for chunk in bytes.chunks(CHUNK_SIZE) {
            self.buf.put_slice(chunk);
            if self.flush_mode == FlushMode::Blocking && self.buf.len() >= CHUNK_SIZE {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Asynchronous twin of `write_raw`; flushes between segments when
    /// `flush_mode` permits a non-blocking flush, checking `cancel` before
    /// each segment.
    async fn write_raw_async(&mut self, bytes: &[u8], cancel: &CancellationToken) -> Result<()> {
        for chunk in bytes.chunks(CHUNK_SIZE) {
            cancel.check()?;
            self.buf.put_slice(chunk);
            if self.flush_mode == FlushMode::NonBlocking && self.buf.len() >= CHUNK_SIZE {
                self.flush_async(cancel).await?;
            }
        }
        Ok(())
    }

    fn write_as_oid(&mut self, catalog: &TypeCatalog, id: &WireTypeId) -> Result<()> {
        let oid = catalog.oid_of(id)?;
        self.write_u32(oid);
        Ok(())
    }

    fn current_format(&self) -> DataFormat {
        self.format
    }

    fn set_current_format(&mut self, format: DataFormat) {
        self.format = format;
    }

    fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    fn flush(&mut self) -> Result<()> {
        if self.flush_mode != FlushMode::Blocking {
            return Err(WrongFlushMode { expected: FlushMode::Blocking, found: self.flush_mode }.into());
        }
        self.flush_count += 1;
        Ok(())
    }

    async fn flush_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;
        if self.flush_mode != FlushMode::NonBlocking {
            return Err(WrongFlushMode { expected: FlushMode::NonBlocking, found: self.flush_mode }.into());
        }
        self.flush_count += 1;
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(ConcurrentUse.into());
        }
        crate::common::span!("writer");
        self.initialized = true;
        Ok(())
    }

    fn reset(&mut self) {
        crate::common::verbose!(flush_count = self.flush_count, "writer reset");
        self.buf.clear();
        self.initialized = false;
        self.flush_count = 0;
    }
}

/// In-memory [`PgReader`] backed by [`Bytes`].
pub struct MemoryReader {
    buf: Bytes,
    /// The most recent span handed out by `read_bytes`, kept alive so the
    /// borrow returned to the caller has somewhere to point.
    last: Bytes,
    initialized: bool,
}

impl MemoryReader {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { buf: bytes.into(), last: Bytes::new(), initialized: false }
    }
}

impl PgReader for MemoryReader {
    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.buf.get_u8())
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.buf.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.buf.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.buf.get_i64())
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.buf.get_u32())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        if self.buf.remaining() < n {
            return Err(crate::error::InvalidWireData {
                wire_type: "<raw>".into(),
                reason: "buffer exhausted".into(),
            }
            .into());
        }
        self.last = self.buf.split_to(n);
        Ok(&self.last)
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    async fn fill_async(&mut self, n: usize, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;
        if self.buf.remaining() < n {
            return Err(crate::error::InvalidWireData {
                wire_type: "<raw>".into(),
                reason: "buffer exhausted".into(),
            }
            .into());
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(ConcurrentUse.into());
        }
        crate::common::span!("reader");
        self.initialized = true;
        Ok(())
    }

    fn reset(&mut self) {
        crate::common::verbose!(remaining = self.remaining(), "reader reset");
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(mut fut: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let waker = unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) };
        let mut cx = Context::from_waker(&waker);
        // SAFETY: `fut` is never moved after being pinned on the stack here.
        let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return out;
            }
        }
    }

    #[test]
    fn flush_rejects_wrong_mode() {
        let mut writer = MemoryWriter::new(FlushMode::NonBlocking);
        assert!(writer.flush().is_err());
    }

    #[test]
    fn initialize_rejects_concurrent_use() {
        let mut writer = MemoryWriter::new(FlushMode::None);
        writer.initialize().unwrap();
        assert!(writer.initialize().is_err());
        writer.reset();
        writer.initialize().unwrap();
    }

    #[test]
    fn write_raw_async_respects_cancellation() {
        let mut writer = MemoryWriter::new(FlushMode::NonBlocking);
        let token = CancellationToken::new();
        token.cancel();
        let result = block_on(writer.write_raw_async(b"hi", &token));
        assert!(result.is_err());
    }

    #[test]
    fn write_raw_flushes_between_segments_when_blocking() {
        let mut writer = MemoryWriter::new(FlushMode::Blocking);
        let big = vec![0u8; CHUNK_SIZE * 3];
        writer.write_raw(&big).unwrap();
        assert_eq!(writer.flush_count, 3);
        assert_eq!(writer.as_slice().len(), big.len());
    }

    #[test]
    fn write_raw_never_flushes_under_none_mode() {
        let mut writer = MemoryWriter::new(FlushMode::None);
        let big = vec![0u8; CHUNK_SIZE * 3];
        writer.write_raw(&big).unwrap();
        assert_eq!(writer.flush_count, 0);
        assert_eq!(writer.as_slice().len(), big.len());
    }

    #[test]
    fn write_raw_async_flushes_between_segments_when_nonblocking() {
        let mut writer = MemoryWriter::new(FlushMode::NonBlocking);
        let token = CancellationToken::new();
        let big = vec![0u8; CHUNK_SIZE * 2];
        block_on(writer.write_raw_async(&big, &token)).unwrap();
        assert_eq!(writer.flush_count, 2);
        assert_eq!(writer.as_slice().len(), big.len());
    }

    #[test]
    fn reader_reads_big_endian() {
        let mut reader = MemoryReader::new(Bytes::from_static(&[0, 0, 0, 42]));
        assert_eq!(reader.read_i32().unwrap(), 42);
    }
}
