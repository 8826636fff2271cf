//! Record-oriented file and pipe I/O for the record processor.
//!
//! A [`RecordFile`] wraps an open handle with a record format and the
//! position bookkeeping (next record number, byte offset). Two on-disk
//! formats exist:
//!
//! - `C` (CDR): records are raw CDR blobs back to back. Seeking walks
//!   frames from the start, trusting each frame's declared length to
//!   skip its body, and fails if fewer bytes remain than declared.
//! - `T` (text): newline-terminated lines. Reads strip the terminator
//!   and wrap the line in a char record; writes require a char record
//!   and append the terminator.
//!
//! All I/O is synchronous and blocks the event loop for its duration.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use auxproc_cdr::{ElemType, HEADER_LEN, Record, frame_len};

/// Direction a handle was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// On-disk record format, one character from a fixed alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Length-prefixed CDR frames (code `C`, the default).
    Cdr,
    /// Newline-terminated text lines (code `T`).
    Text,
}

impl RecordFormat {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'C' => Some(RecordFormat::Cdr),
            'T' => Some(RecordFormat::Text),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            RecordFormat::Cdr => 'C',
            RecordFormat::Text => 'T',
        }
    }
}

/// Failures from record-level I/O, mapped to statuses by the caller.
#[derive(Debug, thiserror::Error)]
pub enum RecordIoError {
    /// The file ended before a full record frame.
    #[error("file truncated mid-record")]
    Truncated,

    /// Fewer bytes were written than the record holds.
    #[error("short write")]
    Partial,

    /// A non-sequential record number on an unseekable handle (pipe).
    #[error("handle does not support seeking")]
    Unseekable,

    /// The bytes at the current position are not a valid record.
    #[error("invalid record frame")]
    BadRecord,

    /// The record's element type does not fit the format.
    #[error("record type not valid for this format")]
    WrongType,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// An open handle plus record-position state.
#[derive(Debug)]
pub struct RecordFile {
    file: File,
    format: RecordFormat,
    seekable: bool,
    next_record: u64,
    offset: u64,
}

impl RecordFile {
    pub fn new(file: File, format: RecordFormat, seekable: bool) -> Self {
        Self {
            file,
            format,
            seekable,
            next_record: 0,
            offset: 0,
        }
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Record number at the current position.
    pub fn next_record(&self) -> u64 {
        self.next_record
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Position on the start of record `recno`.
    ///
    /// A no-op when already there; otherwise rewinds and walks records
    /// from the start, one frame at a time.
    pub fn seek_to(&mut self, recno: u64) -> Result<(), RecordIoError> {
        if recno == self.next_record {
            return Ok(());
        }
        if !self.seekable {
            return Err(RecordIoError::Unseekable);
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.next_record = 0;
        self.offset = 0;
        while self.next_record < recno {
            self.skip_record()?;
        }
        Ok(())
    }

    /// Read one record at the current position and return it as a CDR
    /// record, advancing the position.
    pub fn read_record(&mut self) -> Result<Record, RecordIoError> {
        match self.format {
            RecordFormat::Cdr => {
                let mut header = [0u8; HEADER_LEN];
                read_full(&mut self.file, &mut header)?;
                let nb = frame_len(&header).map_err(|_| RecordIoError::BadRecord)? as usize;
                let mut frame = vec![0u8; nb];
                frame[..HEADER_LEN].copy_from_slice(&header);
                read_full(&mut self.file, &mut frame[HEADER_LEN..])?;
                let record = Record::decode(&frame).map_err(|_| RecordIoError::BadRecord)?;
                self.offset += nb as u64;
                self.next_record += 1;
                Ok(record)
            }
            RecordFormat::Text => {
                let (line, consumed) = self.read_line()?;
                self.offset += consumed;
                self.next_record += 1;
                Ok(Record::encode(ElemType::Char, 1, &line))
            }
        }
    }

    /// Write one record at the current position, advancing it.
    ///
    /// A short write count is reported as [`RecordIoError::Partial`].
    pub fn write_record(&mut self, bytes: &[u8]) -> Result<(), RecordIoError> {
        let frame: Vec<u8> = match self.format {
            RecordFormat::Cdr => {
                Record::decode(bytes).map_err(|_| RecordIoError::BadRecord)?;
                bytes.to_vec()
            }
            RecordFormat::Text => {
                let record = Record::decode(bytes).map_err(|_| RecordIoError::BadRecord)?;
                if record.elem_type() != ElemType::Char {
                    return Err(RecordIoError::WrongType);
                }
                let mut line = record.payload().to_vec();
                line.push(b'\n');
                line
            }
        };

        let written = self.file.write(&frame)?;
        self.offset += written as u64;
        if written < frame.len() {
            return Err(RecordIoError::Partial);
        }
        self.file.flush()?;
        self.next_record += 1;
        Ok(())
    }

    /// Skip one record frame without materializing it.
    fn skip_record(&mut self) -> Result<(), RecordIoError> {
        match self.format {
            RecordFormat::Cdr => {
                let mut header = [0u8; HEADER_LEN];
                read_full(&mut self.file, &mut header)?;
                let nb = frame_len(&header).map_err(|_| RecordIoError::BadRecord)? as u64;
                let file_len = self.file.metadata().map_err(RecordIoError::Io)?.len();
                if self.offset + nb > file_len {
                    return Err(RecordIoError::Truncated);
                }
                self.file.seek(SeekFrom::Current(nb as i64 - HEADER_LEN as i64))?;
                self.offset += nb;
                self.next_record += 1;
                Ok(())
            }
            RecordFormat::Text => {
                let (_, consumed) = self.read_line()?;
                self.offset += consumed;
                self.next_record += 1;
                Ok(())
            }
        }
    }

    /// Read bytes up to and including a newline. Returns the line
    /// without its terminator and the number of bytes consumed.
    fn read_line(&mut self) -> Result<(Vec<u8>, u64), RecordIoError> {
        let mut line = Vec::new();
        let mut consumed = 0u64;
        let mut byte = [0u8; 1];
        loop {
            match self.file.read(&mut byte)? {
                0 => {
                    if line.is_empty() {
                        return Err(RecordIoError::Truncated);
                    }
                    // Final line without terminator still counts.
                    return Ok((line, consumed));
                }
                _ => {
                    consumed += 1;
                    if byte[0] == b'\n' {
                        return Ok((line, consumed));
                    }
                    line.push(byte[0]);
                }
            }
        }
    }
}

fn read_full(file: &mut File, buf: &mut [u8]) -> Result<(), RecordIoError> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            RecordIoError::Truncated
        } else {
            RecordIoError::Io(e)
        }
    })
}

/// Open a file for record reads, reporting its size.
///
/// Seeks to the end to measure, then rewinds.
pub fn open_file_read(path: &Path) -> io::Result<(File, u64)> {
    let mut file = File::open(path)?;
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok((file, size))
}

/// Open (creating if absent) a file for record writes.
///
/// Read access is kept so positioning can walk existing frames; the
/// file is never truncated on open — records overwrite in place.
pub fn open_file_write(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
}

/// Open a named pipe, creating the FIFO if absent.
///
/// An existing path that is not a FIFO is rejected. The open blocks
/// until the other end appears, which is acceptable under the
/// single-threaded model.
pub fn open_pipe(path: &Path, dir: Direction) -> io::Result<File> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            use std::os::unix::fs::FileTypeExt;
            if !meta.file_type().is_fifo() {
                return Err(io::Error::from_raw_os_error(libc::EEXIST));
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => mkfifo(path)?,
        Err(e) => return Err(e),
    }
    match dir {
        Direction::Read => File::open(path),
        Direction::Write => OpenOptions::new().write(true).open(path),
    }
}

#[allow(unsafe_code)] // raw mkfifo(3); no std equivalent
fn mkfifo(path: &Path) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "path contains NUL"))?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o666) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn cdr_file(path: &Path) -> RecordFile {
        RecordFile::new(open_file_write(path).unwrap(), RecordFormat::Cdr, true)
    }

    #[test]
    fn test_cdr_write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.cdr");

        let mut out = cdr_file(&path);
        out.write_record(Record::chars("first").as_bytes()).unwrap();
        out.write_record(Record::ints(&[1, 2]).as_bytes()).unwrap();
        assert_eq!(out.next_record(), 2);
        drop(out);

        let (file, size) = open_file_read(&path).unwrap();
        assert_eq!(size, 25 + 28);
        let mut input = RecordFile::new(file, RecordFormat::Cdr, true);
        assert_eq!(input.read_record().unwrap().text().unwrap(), "first");
        assert_eq!(input.read_record().unwrap().numbers().unwrap(), vec![1, 2]);
        assert!(matches!(
            input.read_record(),
            Err(RecordIoError::Truncated)
        ));
    }

    #[test]
    fn test_cdr_seek_walks_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("walk.cdr");

        let mut out = cdr_file(&path);
        for text in ["aa", "bbbb", "cccccc"] {
            out.write_record(Record::chars(text).as_bytes()).unwrap();
        }
        drop(out);

        let (file, _) = open_file_read(&path).unwrap();
        let mut input = RecordFile::new(file, RecordFormat::Cdr, true);
        input.seek_to(2).unwrap();
        assert_eq!(input.read_record().unwrap().text().unwrap(), "cccccc");

        // Walking backwards rewinds and re-walks.
        input.seek_to(1).unwrap();
        assert_eq!(input.read_record().unwrap().text().unwrap(), "bbbb");
    }

    #[test]
    fn test_cdr_seek_past_end_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.cdr");

        let mut out = cdr_file(&path);
        out.write_record(Record::chars("only").as_bytes()).unwrap();
        drop(out);

        let (file, _) = open_file_read(&path).unwrap();
        let mut input = RecordFile::new(file, RecordFormat::Cdr, true);
        assert!(matches!(input.seek_to(3), Err(RecordIoError::Truncated)));
    }

    #[test]
    fn test_cdr_truncated_frame_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.cdr");

        let mut bytes = Record::chars("hello world").into_bytes();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();

        let (file, _) = open_file_read(&path).unwrap();
        let mut input = RecordFile::new(file, RecordFormat::Cdr, true);
        assert!(matches!(input.seek_to(1), Err(RecordIoError::Truncated)));
    }

    #[test]
    fn test_text_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");

        let mut out =
            RecordFile::new(open_file_write(&path).unwrap(), RecordFormat::Text, true);
        out.write_record(Record::chars("alpha").as_bytes()).unwrap();
        out.write_record(Record::chars("beta").as_bytes()).unwrap();
        drop(out);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha\nbeta\n");

        let (file, _) = open_file_read(&path).unwrap();
        let mut input = RecordFile::new(file, RecordFormat::Text, true);
        input.seek_to(1).unwrap();
        assert_eq!(input.read_record().unwrap().text().unwrap(), "beta");
    }

    #[test]
    fn test_text_write_requires_char_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");

        let mut out =
            RecordFile::new(open_file_write(&path).unwrap(), RecordFormat::Text, true);
        assert!(matches!(
            out.write_record(Record::ints(&[1]).as_bytes()),
            Err(RecordIoError::WrongType)
        ));
    }

    #[test]
    fn test_write_invalid_frame_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.cdr");

        let mut out = cdr_file(&path);
        assert!(matches!(
            out.write_record(&[1, 2, 3]),
            Err(RecordIoError::BadRecord)
        ));
    }

    #[test]
    fn test_unseekable_rejects_nonsequential() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seq.cdr");

        let mut out =
            RecordFile::new(open_file_write(&path).unwrap(), RecordFormat::Cdr, false);
        // Sequential position is fine.
        out.seek_to(0).unwrap();
        assert!(matches!(out.seek_to(5), Err(RecordIoError::Unseekable)));
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(RecordFormat::from_code('C'), Some(RecordFormat::Cdr));
        assert_eq!(RecordFormat::from_code('c'), Some(RecordFormat::Cdr));
        assert_eq!(RecordFormat::from_code('T'), Some(RecordFormat::Text));
        assert_eq!(RecordFormat::from_code('X'), None);
        assert_eq!(RecordFormat::Cdr.code(), 'C');
    }

    #[test]
    fn test_open_pipe_rejects_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-pipe");
        std::fs::write(&path, b"data").unwrap();

        let err = open_pipe(&path, Direction::Read).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
    }

    #[test]
    fn test_open_file_read_reports_size_and_rewinds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sized");
        std::fs::write(&path, vec![0u8; 42]).unwrap();

        let (mut file, size) = open_file_read(&path).unwrap();
        assert_eq!(size, 42);
        assert_eq!(file.stream_position().unwrap(), 0);
    }
}
