//! File and stream I/O for the pipeline. Every byte read lands in a
//! [`SecureBuffer`].

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::buffer::SecureBuffer;
use crate::config::OutputSink;
use crate::error::{Error, Result};

/// Read a whole file into an owned buffer.
pub fn read_file(path: &Path, label: &'static str) -> Result<SecureBuffer> {
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "read file");
    Ok(SecureBuffer::from_vec(label, data))
}

/// Read `reader` to its end, accepting at most `max` bytes.
///
/// One byte past the cap is read to tell "exactly `max`" from "more than
/// `max`"; the latter fails with [`Error::Capacity`].
pub fn read_capped<R: Read + ?Sized>(reader: &mut R, max: usize, label: &'static str) -> Result<SecureBuffer> {
    let ceiling = (max as u64).saturating_add(1);
    let mut data = Vec::new();
    reader.take(ceiling).read_to_end(&mut data).map_err(Error::stdio)?;
    if data.len() > max {
        let needed = data.len();
        zeroize::Zeroize::zeroize(&mut data);
        return Err(Error::Capacity { what: label, needed, limit: max });
    }
    Ok(SecureBuffer::from_vec(label, data))
}

/// Write the plaintext to its sink. `stdout` stands in for the process's
/// standard output.
pub fn write_output(sink: &OutputSink, bytes: &[u8], stdout: &mut dyn Write) -> Result<()> {
    match sink {
        OutputSink::File(path) => {
            fs::write(path, bytes).map_err(|e| Error::io(path, e))?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote plaintext");
        }
        OutputSink::Stdout => {
            stdout.write_all(bytes).map_err(Error::stdio)?;
            stdout.flush().map_err(Error::stdio)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn capped_read_accepts_exactly_max() {
        let mut input = Cursor::new(vec![7u8; 32]);
        let buf = read_capped(&mut input, 32, "input").unwrap();
        assert_eq!(buf.len(), 32);
    }

    #[test]
    fn capped_read_rejects_one_more() {
        let mut input = Cursor::new(vec![7u8; 33]);
        match read_capped(&mut input, 32, "input").unwrap_err() {
            Error::Capacity { what, needed, limit } => {
                assert_eq!((what, needed, limit), ("input", 33, 32));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn stdout_sink_receives_bytes() {
        let mut out = Vec::new();
        write_output(&OutputSink::Stdout, b"hello", &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn missing_file_is_io_error_with_path() {
        let err = read_file(Path::new("/nonexistent/diba/key"), "key").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/nonexistent/diba/key"));
    }
}
