//! Line and data-block framing for the controller wire protocol.

use std::io::{BufRead, Write};

use crate::error::{BridgeError, Result};

/// Splits buffered content into the lines that get sent one-per-wire-line
/// for a data block. Mirrors the source's line walk: a trailing chunk
/// with no terminating LF is still emitted as a final line (the wire
/// framing adds its own terminator regardless), but a buffer that ends
/// exactly on an LF does not produce a spurious empty trailing line.
pub fn split_data_lines(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Prepends an extra `.` to a line that itself begins with one, so the
/// lone-`.` terminator stays unambiguous.
pub fn escape_line(line: &[u8]) -> Vec<u8> {
    if line.first() == Some(&b'.') {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.push(b'.');
        out.extend_from_slice(line);
        out
    } else {
        line.to_vec()
    }
}

/// Strips exactly one leading `.` from a received data line, if present.
pub fn unescape_line(line: &[u8]) -> &[u8] {
    if line.first() == Some(&b'.') {
        &line[1..]
    } else {
        line
    }
}

/// Writes a single LF-terminated command line, optionally tracing it to
/// stderr as `>> ...` when wire debugging is enabled.
pub fn write_line(w: &mut impl Write, line: &str, debug: bool) -> Result<()> {
    if debug {
        tracing::debug!(target: "uxfs::wire", ">> {line}");
    }
    w.write_all(line.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Writes `data` as a complete data block: one escaped line per input
/// line, followed by the lone `.` terminator.
pub fn write_data_block(w: &mut impl Write, data: &[u8], debug: bool) -> Result<()> {
    for line in split_data_lines(data) {
        let escaped = escape_line(line);
        if debug {
            let shown = String::from_utf8_lossy(&escaped);
            tracing::debug!(target: "uxfs::wire", ">> {shown}");
        }
        w.write_all(&escaped)?;
        w.write_all(b"\n")?;
    }
    write_line(w, ".", debug)
}

/// Reads a single LF-terminated line, minus the terminator. A closed pipe
/// (zero bytes read) is a fatal I/O error per the channel's contract.
pub fn read_line(r: &mut impl BufRead, debug: bool) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    let n = r.read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Err(BridgeError::Io);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if debug {
        let shown = String::from_utf8_lossy(&raw);
        tracing::debug!(target: "uxfs::wire", "<< {shown}");
    }
    Ok(raw)
}

/// Reads lines until the lone `.` terminator, unescaping each, and
/// concatenates them (each joined with a trailing LF) into the returned
/// buffer.
pub fn read_data_block(r: &mut impl BufRead, debug: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let line = read_line(r, false)?;
        if debug {
            let shown = String::from_utf8_lossy(&line);
            tracing::debug!(target: "uxfs::wire", "<< {shown}");
        }
        if line == b"." {
            break;
        }
        out.extend_from_slice(unescape_line(&line));
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_trailing_empty_line_but_keeps_partial() {
        assert_eq!(split_data_lines(b"a\nb\n"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(split_data_lines(b"a\nb"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(split_data_lines(b""), Vec::<&[u8]>::new());
    }

    #[test]
    fn escape_and_unescape_round_trip_dotted_lines() {
        let line = b".hidden";
        let escaped = escape_line(line);
        assert_eq!(escaped, b"..hidden");
        assert_eq!(unescape_line(&escaped), line);
    }

    #[test]
    fn escape_is_identity_for_ordinary_lines() {
        let line = b"plain text";
        assert_eq!(escape_line(line), line);
        assert_eq!(unescape_line(line), line);
    }

    #[test]
    fn data_block_round_trips_through_wire_framing() {
        let mut wire = Vec::new();
        write_data_block(&mut wire, b"hi\n.hidden\nlast", false).unwrap();
        assert_eq!(wire, b"hi\n..hidden\nlast\n.\n");

        let mut reader = std::io::BufReader::new(&wire[..]);
        let decoded = read_data_block(&mut reader, false).unwrap();
        assert_eq!(decoded, b"hi\n.hidden\nlast\n");
    }
}
