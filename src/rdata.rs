//! Typed views over RDATA payloads. These are presentation helpers -
//! the codec round-trips RDATA verbatim without them - but anything
//! that wants to log or display an answer goes through here.

use crate::enums::RecordType;
use crate::error::TriDnsError;
use crate::message::ResourceRecord;
use crate::utils::{name_from_bytes, read_u16, read_u32};
use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::from_utf8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(Vec<u8>),
    NS(Vec<u8>),
    PTR(Vec<u8>),
    MX {
        preference: u16,
        exchange: Vec<u8>,
    },
    /// One or more character-strings, each at most 255 bytes.
    TXT(Vec<Vec<u8>>),
    SOA {
        mname: Vec<u8>,
        rname: Vec<u8>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    /// Anything else rides along as raw bytes.
    Other(Vec<u8>),
}

impl RData {
    /// Parses the record's RDATA. `message` is the whole message the
    /// record came from: CNAME/NS/PTR/MX/SOA names may be compressed
    /// and their pointers index into it.
    pub fn parse(record: &ResourceRecord, message: &[u8]) -> Result<RData, TriDnsError> {
        let rdata = &record.rdata;
        match record.record_type {
            RecordType::A => {
                let octets: [u8; 4] = rdata
                    .as_slice()
                    .try_into()
                    .map_err(|_| TriDnsError::format("A rdata is not 4 bytes"))?;
                Ok(RData::A(Ipv4Addr::from(octets)))
            }
            RecordType::AAAA => {
                let octets: [u8; 16] = rdata
                    .as_slice()
                    .try_into()
                    .map_err(|_| TriDnsError::format("AAAA rdata is not 16 bytes"))?;
                Ok(RData::AAAA(Ipv6Addr::from(octets)))
            }
            RecordType::CNAME => Ok(RData::CNAME(rdata_name(rdata, 0, message)?.0)),
            RecordType::NS => Ok(RData::NS(rdata_name(rdata, 0, message)?.0)),
            RecordType::PTR => Ok(RData::PTR(rdata_name(rdata, 0, message)?.0)),
            RecordType::MX => {
                let preference = read_u16(rdata, 0)?;
                let (exchange, _) = rdata_name(rdata, 2, message)?;
                Ok(RData::MX {
                    preference,
                    exchange,
                })
            }
            RecordType::TXT => {
                let mut strings = Vec::new();
                let mut pos = 0;
                while pos < rdata.len() {
                    let len = rdata[pos] as usize;
                    let chunk = rdata.get(pos + 1..pos + 1 + len).ok_or_else(|| {
                        TriDnsError::format("TXT character-string runs past the rdata")
                    })?;
                    strings.push(chunk.to_vec());
                    pos += 1 + len;
                }
                Ok(RData::TXT(strings))
            }
            RecordType::SOA => {
                let (mname, pos) = rdata_name(rdata, 0, message)?;
                let (rname, pos) = rdata_name(rdata, pos, message)?;
                Ok(RData::SOA {
                    mname,
                    rname,
                    serial: read_u32(rdata, pos)?,
                    refresh: read_u32(rdata, pos + 4)?,
                    retry: read_u32(rdata, pos + 8)?,
                    expire: read_u32(rdata, pos + 12)?,
                    minimum: read_u32(rdata, pos + 16)?,
                })
            }
            _ => Ok(RData::Other(rdata.clone())),
        }
    }

    /// Builds the RDATA for a TXT record from one character-string.
    pub fn txt_bytes(text: &[u8]) -> Result<Vec<u8>, TriDnsError> {
        if text.len() > 255 {
            return Err(TriDnsError::format(
                "TXT character-string longer than 255 bytes",
            ));
        }
        let mut rdata = Vec::with_capacity(text.len() + 1);
        rdata.push(text.len() as u8);
        rdata.extend_from_slice(text);
        Ok(rdata)
    }
}

impl Display for RData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RData::A(address) => write!(f, "{address}"),
            RData::AAAA(address) => write!(f, "{address}"),
            RData::CNAME(name) | RData::NS(name) | RData::PTR(name) => {
                write!(f, "{}", String::from_utf8_lossy(name))
            }
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{preference} {}", String::from_utf8_lossy(exchange)),
            RData::TXT(strings) => {
                for (index, chunk) in strings.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    match from_utf8(chunk) {
                        Ok(text) => write!(f, "\"{text}\"")?,
                        Err(_) => write!(f, "{chunk:?}")?,
                    }
                }
                Ok(())
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {serial} {refresh} {retry} {expire} {minimum}",
                String::from_utf8_lossy(mname),
                String::from_utf8_lossy(rname),
            ),
            RData::Other(bytes) => write!(f, "\\# {} bytes", bytes.len()),
        }
    }
}

/// Decodes a name that lives inside an RDATA slice. Literal labels are
/// read from the rdata itself; the moment a compression pointer shows
/// up, decoding continues inside the original message, which is where
/// pointer offsets are anchored.
fn rdata_name(
    rdata: &[u8],
    offset: usize,
    message: &[u8],
) -> Result<(Vec<u8>, usize), TriDnsError> {
    let mut name: Vec<u8> = Vec::new();
    let mut pos = offset;
    loop {
        let len_byte = *rdata
            .get(pos)
            .ok_or_else(|| TriDnsError::format("name runs past the end of the rdata"))?;
        match len_byte & 0b1100_0000 {
            0b0000_0000 => {
                if len_byte == 0 {
                    return Ok((name, pos + 1));
                }
                let label = rdata
                    .get(pos + 1..pos + 1 + len_byte as usize)
                    .ok_or_else(|| TriDnsError::format("label runs past the end of the rdata"))?;
                if !name.is_empty() {
                    name.push(b'.');
                }
                name.extend_from_slice(label);
                if name.len() + 2 > crate::MAX_NAME_BYTES {
                    return Err(TriDnsError::Format(format!(
                        "rdata name longer than {} bytes",
                        crate::MAX_NAME_BYTES
                    )));
                }
                pos += 1 + len_byte as usize;
            }
            0b1100_0000 => {
                let second = *rdata.get(pos + 1).ok_or_else(|| {
                    TriDnsError::format("compression pointer runs past the end of the rdata")
                })?;
                let target = ((len_byte as usize & 0b0011_1111) << 8) | second as usize;
                let (tail, _) = name_from_bytes(message, target)?;
                if !tail.is_empty() {
                    if !name.is_empty() {
                        name.push(b'.');
                    }
                    name.extend_from_slice(&tail);
                }
                return Ok((name, pos + 2));
            }
            _ => {
                return Err(TriDnsError::format("reserved label type in rdata name"));
            }
        }
    }
}
