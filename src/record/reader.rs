//! TFRecord framing.
//!
//! Each record on disk is:
//!
//! ```text
//! u64 LE   payload length
//! u32 LE   masked CRC32C of the 8 length bytes
//! [u8]     payload
//! u32 LE   masked CRC32C of the payload
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::bufread::MultiGzDecoder;

use super::crc::masked_crc32c;
use crate::util::{Error, Result};

/// Gzip member magic.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

const HEADER_SIZE: usize = 12;
const FOOTER_SIZE: usize = 4;

/// Streaming reader yielding one record payload at a time.
pub struct RecordReader<R> {
    inner: R,
    offset: u64,
    verify: bool,
    done: bool,
}

impl RecordReader<Box<dyn Read>> {
    /// Open a record file, decompressing gzip input transparently.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut buffered = BufReader::with_capacity(1024 * 1024, file);

        let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
        let inner: Box<dyn Read> = if is_gzip {
            tracing::debug!("{} is gzip-compressed", path.display());
            Box::new(MultiGzDecoder::new(buffered))
        } else {
            Box::new(buffered)
        };

        Ok(Self::new(inner))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader positioned at the start of a record stream.
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0, verify: true, done: false }
    }

    /// Enable or disable CRC verification (enabled by default).
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Byte offset of the next record in the (decompressed) stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next record. Returns `Ok(None)` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let start = self.offset;

        let mut header = [0u8; HEADER_SIZE];
        if !self.fill_or_eof(&mut header)? {
            return Ok(None);
        }
        let len = LittleEndian::read_u64(&header[0..8]);
        let len_crc = LittleEndian::read_u32(&header[8..12]);
        if self.verify && masked_crc32c(&header[0..8]) != len_crc {
            return Err(Error::ChecksumMismatch { offset: start });
        }

        let mut payload = Vec::new();
        let got = (&mut self.inner).take(len).read_to_end(&mut payload)?;
        if got as u64 != len {
            return Err(Error::record(format!(
                "record at offset {} truncated: expected {} bytes, got {}",
                start, len, got
            )));
        }

        let mut footer = [0u8; FOOTER_SIZE];
        self.inner.read_exact(&mut footer).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::record(format!("record at offset {} missing footer", start))
            } else {
                Error::Io(e)
            }
        })?;
        if self.verify && masked_crc32c(&payload) != LittleEndian::read_u32(&footer) {
            return Err(Error::ChecksumMismatch { offset: start });
        }

        self.offset += (HEADER_SIZE + FOOTER_SIZE) as u64 + len;
        Ok(Some(payload))
    }

    /// Fill `buf` completely, or return false if the stream ended before any byte.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(false),
            n if n == buf.len() => Ok(true),
            n => Err(Error::record(format!(
                "truncated record header at offset {} ({} of {} bytes)",
                self.offset,
                n,
                buf.len()
            ))),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_record().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Writer producing TFRecord framing.
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a record file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordWriter<W> {
    /// Wrap any writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Append one framed record.
    pub fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let len = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_u32::<LittleEndian>(masked_crc32c(&len))?;
        self.inner.write_all(payload)?;
        self.inner.write_u32::<LittleEndian>(masked_crc32c(payload))?;
        Ok(())
    }

    /// Flush buffered output.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the wrapped writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(records: &[&[u8]]) -> Vec<u8> {
        let mut w = RecordWriter::new(Vec::new());
        for r in records {
            w.write_record(r).unwrap();
        }
        w.into_inner().unwrap()
    }

    #[test]
    fn test_read_back() {
        let bytes = framed(&[b"first", b"", b"third record"]);
        let reader = RecordReader::new(Cursor::new(bytes));
        let records: Vec<Vec<u8>> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]);
    }

    #[test]
    fn test_offset_tracks_records() {
        let bytes = framed(&[b"abc", b"defgh"]);
        let total = bytes.len() as u64;
        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert_eq!(reader.offset(), 0);

        reader.read_record().unwrap();
        assert_eq!(reader.offset(), (HEADER_SIZE + FOOTER_SIZE + 3) as u64);
        while reader.read_record().unwrap().is_some() {}
        assert_eq!(reader.offset(), total);
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_payload() {
        let mut bytes = framed(&[b"payload"]);
        bytes[HEADER_SIZE + 2] ^= 0xFF;
        let mut reader = RecordReader::new(Cursor::new(bytes.clone()));
        assert!(matches!(reader.read_record(), Err(Error::ChecksumMismatch { offset: 0 })));

        let mut unchecked = RecordReader::new(Cursor::new(bytes)).verify_checksums(false);
        assert!(unchecked.read_record().unwrap().is_some());
    }

    #[test]
    fn test_truncated() {
        let bytes = framed(&[b"payload"]);
        let cut = bytes[..bytes.len() - 6].to_vec();
        let mut reader = RecordReader::new(Cursor::new(cut));
        assert!(matches!(reader.read_record(), Err(Error::InvalidRecord(_))));

        let mut reader = RecordReader::new(Cursor::new(bytes[..5].to_vec()));
        assert!(matches!(reader.read_record(), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut bytes = framed(&[b"a", b"b"]);
        bytes[HEADER_SIZE] ^= 0x01;
        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_open_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.tfrecord");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&framed(&[b"zipped", b"records"])).unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        let records: Vec<Vec<u8>> = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records, vec![b"zipped".to_vec(), b"records".to_vec()]);
    }
}
