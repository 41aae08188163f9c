//! ## Fortran unformatted record framing
//!
//! Every record on the wire is a length-prefixed, length-terminated block:
//!
//! ```text
//! +-------+----------+-------+
//! | len:i32 |  data[len]  | len:i32 |
//! +-------+----------+-------+
//! ```
//!
//! Lengths are little-endian 4-byte signed integers. This is the sole framing
//! mechanism in a HAR stream; there is no other way to resynchronize after a
//! malformed record, so a length mismatch is always fatal.
//!
//! A number of sub-records additionally carry a 4-byte ASCII padding
//! (`"    "`) immediately following the data. The reader validates and
//! strips it, the writer re-emits it.

use crate::error::{HarError, Result};
use std::io::{self, Read, Write};

const PADDING: [u8; 4] = *b"    ";

/// Read a single length-prefixed record from `reader`, returning its payload.
///
/// Returns `Ok(None)` if the stream is exhausted exactly at a record
/// boundary (clean EOF). A partial read past that boundary is reported as
/// [`HarError::UnexpectedEof`].
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let n = read_up_to(reader, &mut len_buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n < 4 {
        return Err(HarError::UnexpectedEof);
    }

    let head = i32::from_le_bytes(len_buf);
    if head < 0 {
        return Err(HarError::invalid_data(format!(
            "negative record length: {head}"
        )));
    }

    let mut data = vec![0u8; head as usize];
    reader.read_exact(&mut data).map_err(eof_aware)?;

    let mut tail_buf = [0u8; 4];
    reader.read_exact(&mut tail_buf).map_err(eof_aware)?;
    let tail = i32::from_le_bytes(tail_buf);

    if head != tail {
        return Err(HarError::invalid_data(
            "initiating and terminating lengths do not match",
        ));
    }

    Ok(Some(data))
}

/// Read a record and fail with [`HarError::UnexpectedEof`] on a clean EOF.
/// Used whenever the caller already knows more data must follow (e.g. the
/// description record that always follows a header record).
pub fn read_record_required<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    read_record(reader)?.ok_or(HarError::UnexpectedEof)
}

/// Read a record and strip its expected 4-byte ASCII padding.
pub fn read_padded_record<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut data = read_record_required(reader)?;
    if data.len() < 4 || data[..4] != PADDING {
        return Err(HarError::invalid_data("failed to find expected padding"));
    }
    Ok(data.split_off(4))
}

/// Write `payload` as a single length-prefixed record.
pub fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = i32::try_from(payload.len())
        .map_err(|_| HarError::invalid_data("record payload too large to frame"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&len.to_le_bytes())?;
    Ok(())
}

/// Write `payload` preceded by the 4-byte ASCII padding.
pub fn write_padded_record<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let mut framed = Vec::with_capacity(payload.len() + 4);
    framed.extend_from_slice(&PADDING);
    framed.extend_from_slice(payload);
    write_record(writer, &framed)
}

/// Like `Read::read`, but keeps retrying on `ErrorKind::Interrupted` and
/// reports how many bytes actually landed in `buf` instead of erroring on a
/// short read. Used only at the point where a clean EOF is a valid outcome.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

fn eof_aware(e: io::Error) -> HarError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        HarError::UnexpectedEof
    } else {
        HarError::Io(e)
    }
}
