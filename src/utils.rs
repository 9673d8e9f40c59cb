use crate::error::TriDnsError;
use crate::{MAX_LABEL_BYTES, MAX_NAME_BYTES, MAX_POINTER_HOPS};

/// Turns a presentation-form name (ie, `example.com`, one optional
/// trailing dot allowed) into its wire form. No compression is emitted;
/// an empty name becomes the single root byte.
pub fn name_as_bytes(name: &[u8]) -> Result<Vec<u8>, TriDnsError> {
    let name = match name.last() {
        Some(b'.') => &name[..name.len() - 1],
        _ => name,
    };
    if name.is_empty() {
        return Ok(vec![0]);
    }

    let mut retval: Vec<u8> = Vec::with_capacity(name.len() + 2);
    for label in name.split(|byte| *byte == b'.') {
        if label.is_empty() {
            return Err(TriDnsError::format("empty label in name"));
        }
        if label.len() > MAX_LABEL_BYTES {
            return Err(TriDnsError::Format(format!(
                "label length is {}, needs to be <= {MAX_LABEL_BYTES}",
                label.len()
            )));
        }
        retval.push(label.len() as u8);
        retval.extend_from_slice(label);
    }
    retval.push(0);

    if retval.len() > MAX_NAME_BYTES {
        return Err(TriDnsError::Format(format!(
            "encoded name is {} bytes, limit is {MAX_NAME_BYTES}",
            retval.len()
        )));
    }
    Ok(retval)
}

/// Decodes one name starting at `offset`, chasing compression pointers
/// through the original message. Returns the name (labels joined with
/// `.`, no trailing dot) and the offset just past the name in the
/// original byte stream.
///
/// Pointers must target an earlier offset, at most [MAX_POINTER_HOPS]
/// may be followed, and the materialised name stays under
/// [MAX_NAME_BYTES]; a crafted message trips one of the three before it
/// can loop.
pub fn name_from_bytes(buf: &[u8], offset: usize) -> Result<(Vec<u8>, usize), TriDnsError> {
    let mut name: Vec<u8> = Vec::new();
    let mut pos = offset;
    // where reading resumes once the first pointer has been taken
    let mut resume_at: Option<usize> = None;
    let mut hops: usize = 0;

    loop {
        let len_byte = *buf
            .get(pos)
            .ok_or_else(|| TriDnsError::format("name runs past the end of the message"))?;
        match len_byte & 0b1100_0000 {
            0b0000_0000 => {
                if len_byte == 0 {
                    pos += 1;
                    break;
                }
                let label_len = len_byte as usize;
                let label = buf.get(pos + 1..pos + 1 + label_len).ok_or_else(|| {
                    TriDnsError::format("label runs past the end of the message")
                })?;
                if !name.is_empty() {
                    name.push(b'.');
                }
                name.extend_from_slice(label);
                // presentation length + leading length byte + terminator
                if name.len() + 2 > MAX_NAME_BYTES {
                    return Err(TriDnsError::Format(format!(
                        "name longer than {MAX_NAME_BYTES} bytes"
                    )));
                }
                pos += 1 + label_len;
            }
            0b1100_0000 => {
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(TriDnsError::Format(format!(
                        "more than {MAX_POINTER_HOPS} compression pointers in one name"
                    )));
                }
                let second = *buf.get(pos + 1).ok_or_else(|| {
                    TriDnsError::format("compression pointer runs past the end of the message")
                })?;
                let target = ((len_byte as usize & 0b0011_1111) << 8) | second as usize;
                if target >= pos {
                    return Err(TriDnsError::Format(format!(
                        "compression pointer at {pos} targets {target}, must point backwards"
                    )));
                }
                if resume_at.is_none() {
                    resume_at = Some(pos + 2);
                }
                pos = target;
            }
            // 01 and 10 are reserved label types
            other => {
                return Err(TriDnsError::Format(format!(
                    "reserved label type {:#04x}",
                    other >> 6
                )));
            }
        }
    }

    Ok((name, resume_at.unwrap_or(pos)))
}

/// Reads a big-endian u16 at `pos`, bounds-checked.
pub fn read_u16(buf: &[u8], pos: usize) -> Result<u16, TriDnsError> {
    let bytes = buf
        .get(pos..pos + 2)
        .ok_or_else(|| TriDnsError::format("u16 read past the end of the buffer"))?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Reads a big-endian u32 at `pos`, bounds-checked.
pub fn read_u32(buf: &[u8], pos: usize) -> Result<u32, TriDnsError> {
    let bytes = buf
        .get(pos..pos + 4)
        .ok_or_else(|| TriDnsError::format("u32 read past the end of the buffer"))?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a big-endian i32 (record TTLs are signed on the wire) at `pos`.
pub fn read_i32(buf: &[u8], pos: usize) -> Result<i32, TriDnsError> {
    Ok(read_u32(buf, pos)? as i32)
}

/// A short hex rendering of a buffer for trace logs, `..` when cut off.
pub fn hex_preview(buf: &[u8], limit: usize) -> String {
    let mut out = String::with_capacity(limit * 3 + 2);
    for byte in buf.iter().take(limit) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    if buf.len() > limit {
        out.push_str(" ..");
    }
    out
}
