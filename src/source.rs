use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::chunk::CHUNK_MAX_SIZE;
use crate::error::DecodeError;

enum Backing<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> Backing<'a> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Borrowed(bytes) => bytes,
            Backing::Owned(bytes) => bytes.as_slice(),
        }
    }
}

enum Inner<'a> {
    File {
        file: File,
        len: u64,
        pos: u64,
        scratch: Vec<u8>,
    },
    Memory {
        bytes: Backing<'a>,
        start: usize,
        end: usize,
    },
}

/// A seekable byte stream backed by a file, borrowed memory, or owned memory.
///
/// `read` advances a window over the stream and returns the bytes just read;
/// the file variant copies into a reusable scratch buffer sized for the
/// largest legal chunk, the memory variants hand out subslices.
pub struct ByteSource<'a> {
    inner: Inner<'a>,
}

impl<'a> ByteSource<'a> {
    pub fn with_filename<P: AsRef<Path>>(path: P) -> Result<ByteSource<'a>, DecodeError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                return Err(DecodeError::FileOpen(err));
            }
        };
        ByteSource::with_file(file)
    }

    pub fn with_file(mut file: File) -> Result<ByteSource<'a>, DecodeError> {
        let len = match file.seek(SeekFrom::End(0)) {
            Ok(len) => len,
            Err(err) => {
                return Err(DecodeError::FileOpen(err));
            }
        };
        if let Err(err) = file.seek(SeekFrom::Start(0)) {
            return Err(DecodeError::FileOpen(err));
        }
        Ok(ByteSource {
            inner: Inner::File {
                file,
                len,
                pos: 0,
                scratch: Vec::with_capacity(CHUNK_MAX_SIZE as usize),
            },
        })
    }

    pub fn with_memory(bytes: Vec<u8>) -> ByteSource<'a> {
        ByteSource {
            inner: Inner::Memory {
                bytes: Backing::Owned(bytes),
                start: 0,
                end: 0,
            },
        }
    }

    pub fn with_memory_ref(bytes: &'a [u8]) -> ByteSource<'a> {
        ByteSource {
            inner: Inner::Memory {
                bytes: Backing::Borrowed(bytes),
                start: 0,
                end: 0,
            },
        }
    }

    /// Reads exactly `count` bytes, advancing the window. Fails with
    /// `FileRead` when the source has fewer than `count` bytes left.
    pub fn read(self: &mut ByteSource<'a>, count: usize) -> Result<&[u8], DecodeError> {
        match &mut self.inner {
            Inner::File {
                file,
                len,
                pos,
                scratch,
            } => {
                if *pos + count as u64 > *len {
                    return Err(DecodeError::FileRead(unexpected_eof()));
                }
                scratch.resize(count, 0);
                if let Err(err) = file.read_exact(&mut scratch[..count]) {
                    return Err(DecodeError::FileRead(err));
                }
                *pos += count as u64;
                Ok(&scratch[..count])
            }
            Inner::Memory { bytes, start, end } => {
                let data = bytes.as_slice();
                if *end + count > data.len() {
                    return Err(DecodeError::FileRead(unexpected_eof()));
                }
                *start = *end;
                *end += count;
                Ok(&data[*start..*end])
            }
        }
    }

    /// Repositions the stream. Only `Start` and `Current` are meaningful for
    /// RoQ streams; the memory variants collapse the window to the target.
    pub fn seek(self: &mut ByteSource<'a>, seek: SeekFrom) -> Result<(), DecodeError> {
        match &mut self.inner {
            Inner::File { file, pos, .. } => match file.seek(seek) {
                Ok(new_pos) => {
                    *pos = new_pos;
                    Ok(())
                }
                Err(err) => Err(DecodeError::FileRead(err)),
            },
            Inner::Memory { bytes, start, end } => {
                let len = bytes.as_slice().len() as i64;
                let target = match seek {
                    SeekFrom::Start(offset) => offset as i64,
                    SeekFrom::Current(offset) => *end as i64 + offset,
                    SeekFrom::End(offset) => len + offset,
                };
                if target < 0 {
                    return Err(DecodeError::FileRead(unexpected_eof()));
                }
                let target = target.min(len) as usize;
                *start = target;
                *end = target;
                Ok(())
            }
        }
    }

    /// True when no further bytes are available.
    pub fn eof(&self) -> bool {
        match &self.inner {
            Inner::File { len, pos, .. } => pos >= len,
            Inner::Memory { bytes, end, .. } => *end >= bytes.as_slice().len(),
        }
    }
}

fn unexpected_eof() -> std::io::Error {
    std::io::ErrorKind::UnexpectedEof.into()
}
