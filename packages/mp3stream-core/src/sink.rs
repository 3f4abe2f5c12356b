use std::{
    cell::RefCell,
    fmt::Debug,
    io::{self, ErrorKind, Seek, SeekFrom, Write},
    rc::Rc,
};

/// * Where the compressed bytes go.
/// * Seekability is a property of the sink, known up front, never discovered by trying to seek.
pub trait Sink: Debug {
    /// * Writes as much of `bytes` as the sink accepts and returns how much that was.
    /// * A return value smaller than `bytes.len()` is a short write.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// * Moves the write position to `offset` from the start and returns where it landed.
    fn seek(&mut self, offset: u64) -> io::Result<u64>;

    /// * The current write position.
    fn tell(&mut self) -> io::Result<u64>;

    fn is_seekable(&self) -> bool;

    fn flush(&mut self) -> io::Result<()>;
}

/// * Keeps writing until everything went through, the writer returns `0`, or an error that isn't `Interrupted`.
/// * Bytes accepted before an error still count.
fn write_until_stalled<W>(writer: &mut W, bytes: &[u8]) -> io::Result<usize>
where
    W: Write + ?Sized,
{
    let mut accepted = 0usize;
    while accepted < bytes.len() {
        match writer.write(&bytes[accepted..]) {
            Ok(0) => break,
            Ok(n) => accepted += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if accepted == 0 {
                    return Err(e);
                }
                break;
            }
        }
    }
    Ok(accepted)
}

/// * A sink over anything that is `Write + Seek`: files, cursors.
#[derive(Debug)]
pub struct SeekableSink<W>(W)
where
    W: Write + Seek + Debug;

impl<W> SeekableSink<W>
where
    W: Write + Seek + Debug,
{
    pub fn new(writer: W) -> Self {
        Self(writer)
    }

    pub fn get_ref(&self) -> &W {
        &self.0
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.0
    }

    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W> Sink for SeekableSink<W>
where
    W: Write + Seek + Debug,
{
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        write_until_stalled(&mut self.0, bytes)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.0.seek(SeekFrom::Start(offset))
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.0.stream_position()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// * A sink over a pipe, a socket or anything else that is only `Write`.
/// * It counts the bytes that went through so `tell()` still works.
#[derive(Debug)]
pub struct StreamSink<W>
where
    W: Write + Debug,
{
    writer: W,
    position: u64,
}

impl<W> StreamSink<W>
where
    W: Write + Debug,
{
    pub fn new(writer: W) -> Self {
        Self { writer, position: 0 }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Sink for StreamSink<W>
where
    W: Write + Debug,
{
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let accepted = write_until_stalled(&mut self.writer, bytes)?;
        self.position += accepted as u64;
        Ok(accepted)
    }

    fn seek(&mut self, _offset: u64) -> io::Result<u64> {
        Err(io::Error::new(ErrorKind::Unsupported, "The stream sink can't seek"))
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// * Encapsulated shared `Sink`, so the caller can keep a handle on a sink the writer owns.
#[derive(Debug)]
pub struct SharedSink<S>(Rc<RefCell<S>>)
where
    S: Sink;

impl<S> SharedSink<S>
where
    S: Sink,
{
    pub fn new(sink: S) -> Self {
        Self(Rc::new(RefCell::new(sink)))
    }

    /// * Runs `action` with the inner sink borrowed.
    pub fn escorted_use<T, F>(&self, action: F) -> T
    where
        F: FnOnce(&mut S) -> T,
    {
        let mut guard = self.0.borrow_mut();
        (action)(&mut *guard)
    }
}

impl<S> Clone for SharedSink<S>
where
    S: Sink,
{
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> Sink for SharedSink<S>
where
    S: Sink,
{
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(bytes)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.0.borrow_mut().seek(offset)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.0.borrow_mut().tell()
    }

    fn is_seekable(&self) -> bool {
        self.0.borrow().is_seekable()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}
