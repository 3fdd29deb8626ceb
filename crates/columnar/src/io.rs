//! Byte sources and sinks for columnar objects.

use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use zed_core::{Error, Result};

/// Positional reads from an immutable byte source.
///
/// Implementations must tolerate concurrent calls; readers on the same
/// object share one source.
pub trait ReadAt: Send + Sync {
    /// Read into `buf` starting at `offset`, returning the bytes read.
    /// A short count means the source ended.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

fn read_slice(src: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let start = match usize::try_from(offset) {
        Ok(s) if s < src.len() => s,
        _ => return 0,
    };
    let n = buf.len().min(src.len() - start);
    buf[..n].copy_from_slice(&src[start..start + n]);
    n
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

impl ReadAt for Bytes {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

impl ReadAt for Mmap {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice(self, offset, buf))
    }
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            match FileExt::read_at(self, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            match self.seek_read(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Box<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }
}

/// Fill `buf` from `offset`, failing with `BadFormat` if the source ends
/// first.
pub fn read_exact_at<R: ReadAt + ?Sized>(src: &R, offset: u64, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read_at(offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            return Err(Error::BadFormat(format!(
                "short read: wanted {} bytes at offset {}, got {}",
                buf.len(),
                offset,
                filled
            )));
        }
        filled += n;
    }
    Ok(())
}

/// Memory-map `file` for reading.
pub fn map_file(file: &File) -> Result<Mmap> {
    // SAFETY: objects are immutable once closed; the map is read-only.
    let map = unsafe { Mmap::map(file)? };
    Ok(map)
}

/// Destination of a columnar object.
pub trait WriteSink {
    /// Write some of `buf`, returning how much was taken.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Finish the object.
    fn close(&mut self) -> Result<()>;

    /// Give up on the object, removing whatever was written.
    fn abort(&mut self) -> Result<()> {
        self.close()
    }
}

impl WriteSink for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }
}

impl<S: WriteSink + ?Sized> WriteSink for &mut S {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn abort(&mut self) -> Result<()> {
        (**self).abort()
    }
}

/// Write every byte of `buf` to `sink`.
pub(crate) fn write_all<S: WriteSink + ?Sized>(sink: &mut S, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = sink.write(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "sink accepted no bytes").into());
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// A file being written as a columnar object.
///
/// `close` flushes and syncs the file; `abort` removes it.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(FileSink {
            path,
            file: Some(BufWriter::new(file)),
        })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WriteSink for FileSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.file.as_mut() {
            Some(f) => Ok(f.write(buf)?),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed").into()),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(f) = self.file.take() {
            let file = f.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.file = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(target: "zed::columnar", path = %self.path.display(), error = %e, "failed to remove aborted object");
                Err(e.into())
            }
        }
    }
}
