use enum_iterator::Sequence;
use packed_struct::prelude::*;
use std::fmt::Display;

/// The long-running tasks that make up the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Agent {
    UdpServer,
    DotServer,
    DoqServer,
    CacheSweeper,
}

#[derive(Clone, Debug)]
pub enum AgentState {
    Started { agent: Agent },
    Stopped { agent: Agent },
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Sequence)]
/// A four bit field that specifies kind of query in this message.
/// This value is set by the originator of a query and copied into the response.
pub enum OpCode {
    /// A standard query (QUERY)
    Query = 0,
    // IQuery = 1, an inverse query (IQUERY) - obsolete in https://www.rfc-editor.org/rfc/rfc3425
    /// Server status request (STATUS)
    Status = 2,
    /// 3-15            reserved for future use
    Reserved = 15,
}

impl From<u8> for OpCode {
    fn from(input: u8) -> Self {
        match input {
            0 => Self::Query,
            2 => Self::Status,
            _ => Self::Reserved,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Sequence)]
/// Response code, things like NOERROR, FORMATERROR, SERVFAIL etc.
pub enum Rcode {
    /// No error condition
    NoError = 0,
    /// Format error - The name server was unable to interpret the query.
    FormatError = 1,
    /// Server failure - The name server was unable to process this query due to a problem with the name server.
    ServFail = 2,
    /// Name Error - the domain name referenced in the query does not exist, aka NXDOMAIN.
    NameError = 3,
    /// Not Implemented - The name server does not support the requested kind of query.
    NotImplemented = 4,
    /// Refused - The name server refuses to perform the specified operation for policy reasons.
    Refused = 5,
    /// 6..15 - Reserved for future use
    Reserved = 15,
}

impl From<u8> for Rcode {
    fn from(input: u8) -> Self {
        match input {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServFail,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            _ => Self::Reserved,
        }
    }
}

impl Display for Rcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Rcode::NoError => "NOERROR",
            Rcode::FormatError => "FORMERR",
            Rcode::ServFail => "SERVFAIL",
            Rcode::NameError => "NXDOMAIN",
            Rcode::NotImplemented => "NOTIMP",
            Rcode::Refused => "REFUSED",
            Rcode::Reserved => "RESERVED",
        })
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// RRType, eg A, NS, MX, etc. Types outside the recognized set keep
/// their numeric value so OPT, DNSSEC and SVCB records pass through a
/// decode/encode cycle untouched.
pub enum RecordType {
    /// A host address
    A,
    /// Authoritative name server
    NS,
    /// The canonical name for an alias
    CNAME,
    /// Marks the start of a zone of authority
    SOA,
    /// A domain name pointer
    PTR,
    /// Mail exchange
    MX,
    /// Text strings
    TXT,
    /// IPv6 host address <https://www.rfc-editor.org/rfc/rfc3596#section-2.1>
    AAAA,
    /// EDNS(0) pseudo-record <https://www.rfc-editor.org/rfc/rfc6891>
    OPT,
    /// A request for all records (*)
    ANY,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(input: u16) -> Self {
        match input {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            6 => Self::SOA,
            12 => Self::PTR,
            15 => Self::MX,
            16 => Self::TXT,
            28 => Self::AAAA,
            41 => Self::OPT,
            255 => Self::ANY,
            other => Self::Unknown(other),
        }
    }
}

impl RecordType {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::SOA => 6,
            Self::PTR => 12,
            Self::MX => 15,
            Self::TXT => 16,
            Self::AAAA => 28,
            Self::OPT => 41,
            Self::ANY => 255,
            Self::Unknown(other) => other,
        }
    }

    /// True for the types a question may carry.
    pub fn known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::NS => write!(f, "NS"),
            Self::CNAME => write!(f, "CNAME"),
            Self::SOA => write!(f, "SOA"),
            Self::PTR => write!(f, "PTR"),
            Self::MX => write!(f, "MX"),
            Self::TXT => write!(f, "TXT"),
            Self::AAAA => write!(f, "AAAA"),
            Self::OPT => write!(f, "OPT"),
            Self::ANY => write!(f, "ANY"),
            Self::Unknown(other) => write!(f, "TYPE{other}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// CLASS fields appear in questions and resource records; almost
/// everything is IN. Ref RFC1035 3.2.4.
pub enum RecordClass {
    /// IN - Internet
    Internet,
    /// CH - Chaos
    Chaos,
    /// HS - Hesiod [Dyer 87]
    Hesiod,
    /// A request for any class (*)
    Any,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(input: u16) -> Self {
        match input {
            1 => Self::Internet,
            3 => Self::Chaos,
            4 => Self::Hesiod,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

impl RecordClass {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Internet => 1,
            Self::Chaos => 3,
            Self::Hesiod => 4,
            Self::Any => 255,
            Self::Unknown(other) => other,
        }
    }

    pub fn known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Display for RecordClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordClass::Internet => write!(f, "IN"),
            RecordClass::Chaos => write!(f, "CHAOS"),
            RecordClass::Hesiod => write!(f, "HESIOD"),
            RecordClass::Any => write!(f, "ANY"),
            RecordClass::Unknown(other) => write!(f, "CLASS{other}"),
        }
    }
}

#[derive(Debug, PrimitiveEnum_u8, Clone, Copy, Eq, PartialEq)]
pub enum PacketType {
    Query = 0,
    Answer = 1,
}

impl From<bool> for PacketType {
    fn from(input: bool) -> Self {
        match input {
            false => Self::Query,
            true => Self::Answer,
        }
    }
}
