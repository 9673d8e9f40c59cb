use packed_struct::prelude::*;

use crate::enums::{OpCode, PacketType, Rcode};

/// TTL-bounded record cache with negative caching.
pub mod cache;
pub mod cli;
/// Configuration handling for the server.
pub mod config;
pub mod enums;
pub mod error;
pub mod logging;
pub mod message;
pub mod rdata;
pub mod resolver;
pub mod servers;
pub mod service;
#[cfg(test)]
mod tests;
pub mod tls;
pub mod upstream;
pub mod utils;

/// The size of a DNS message header
pub const HEADER_BYTES: usize = 12;
/// Receive buffer for UDP queries <https://dnsflagday.net/2020/#dns-flag-day-2020>
pub const UDP_BUFFER_SIZE: usize = 1232;
/// The largest datagram we will send back over plain UDP
pub const MAX_UDP_PAYLOAD: usize = 512;
/// Upper bound for a single message on a stream transport
pub const MAX_STREAM_MESSAGE_BYTES: usize = 65535;
/// Longest encoded name, length bytes and terminator included
pub const MAX_NAME_BYTES: usize = 255;
/// Longest single label
pub const MAX_LABEL_BYTES: usize = 63;
/// Compression pointer budget while decoding one name
pub const MAX_POINTER_HOPS: usize = 10;
/// Well-known plain DNS port
pub const DNS_PORT: u16 = 53;
/// Well-known DoT/DoQ port
pub const DNS_TLS_PORT: u16 = 853;
/// ALPN identifier for DNS-over-QUIC
pub const DOQ_ALPN: &[u8] = b"doq";

/// The header of a DNS transmission, either a Query or Reply. Ref
/// [RFC1035](https://www.rfc-editor.org/rfc/rfc1035#section-4.1.1) section 4.1.1.
///
/// Opcode and rcode stay numeric in the packed form so that messages
/// carrying values we don't recognize still unpack; [Header::opcode] and
/// [Header::rcode] give the typed view.
#[derive(Debug, PackedStruct, PartialEq, Clone)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct Header {
    /// The query ID
    #[packed_field(bits = "0..=15", endian = "msb")]
    pub id: u16,
    /// Is it a query or response
    #[packed_field(bits = "16", ty = "enum")]
    pub qr: PacketType,
    #[packed_field(bits = "17..=20")]
    pub opcode: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "21")]
    pub authoritative: bool,
    #[packed_field(bits = "22")]
    pub truncated: bool,
    /// RD - may be set in a query and is copied into the response
    #[packed_field(bits = "23")]
    pub recursion_desired: bool,
    #[packed_field(bits = "24")]
    pub recursion_available: bool,
    /// reserved, written as zero in anything we build
    #[packed_field(bits = "25")]
    pub z: bool,
    #[packed_field(bits = "26")]
    pub ad: bool,
    #[packed_field(bits = "27")]
    pub cd: bool,
    #[packed_field(bits = "28..=31")]
    pub rcode: Integer<u8, packed_bits::Bits<4>>,
    /// an unsigned 16 bit integer specifying the number of entries in the question section.
    #[packed_field(bits = "32..=47", endian = "msb")]
    pub qdcount: u16,
    /// an unsigned 16 bit integer specifying the number of entries in the answer section.
    #[packed_field(bits = "48..=63", endian = "msb")]
    pub ancount: u16,
    /// an unsigned 16 bit integer specifying the number of name server resource records in the authority records section.
    #[packed_field(bits = "64..=79", endian = "msb")]
    pub nscount: u16,
    /// an unsigned 16 bit integer specifying the number of resource records in the additional records section.
    #[packed_field(bits = "80..=95", endian = "msb")]
    pub arcount: u16,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            id: 0,
            qr: PacketType::Query,
            opcode: (OpCode::Query as u8).into(),
            authoritative: false,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            z: false,
            ad: false,
            cd: false,
            rcode: (Rcode::NoError as u8).into(),
            qdcount: 0,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }
}

impl Header {
    /// The typed view of the four opcode bits.
    pub fn opcode(&self) -> OpCode {
        OpCode::from(u8::from(self.opcode))
    }

    /// The typed view of the four rcode bits.
    pub fn rcode(&self) -> Rcode {
        Rcode::from(u8::from(self.rcode))
    }

    pub fn as_answer(self) -> Header {
        let mut response = self;
        response.qr = PacketType::Answer;
        response
    }
}
