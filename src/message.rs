use crate::enums::{PacketType, Rcode, RecordClass, RecordType};
use crate::error::TriDnsError;
use crate::utils::{name_as_bytes, name_from_bytes, read_i32, read_u16};
use crate::{Header, HEADER_BYTES};
use packed_struct::prelude::*;
use std::fmt::Display;
use std::str::from_utf8;

#[derive(Clone, Debug, PartialEq, Eq)]
/// A DNS Question section entry, from Ref
/// [RFC1035](https://www.rfc-editor.org/rfc/rfc1035#section-4.1.2) section 4.1.2.
pub struct Question {
    /// The name which is being queried, labels joined with `.`, case
    /// kept exactly as received so responses echo it byte for byte.
    pub qname: Vec<u8>,
    /// The Record type that is being requested, eg A, NS, MX, TXT etc.
    pub qtype: RecordType,
    /// The class, (typically IN for "Internet")
    pub qclass: RecordClass,
}

impl Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let qname = match from_utf8(&self.qname) {
            Ok(value) => value.to_string(),
            Err(_) => format!("{:?}", self.qname),
        };
        f.write_fmt(format_args!(
            "QNAME={} QTYPE={} QCLASS={}",
            qname, self.qtype, self.qclass,
        ))
    }
}

impl Question {
    /// ASCII-lowercased copy of the qname, the form cache keys use.
    pub fn normalized_name(&self) -> Vec<u8> {
        self.qname.to_ascii_lowercase()
    }

    /// Decodes one question at `offset`, returning it and the offset of
    /// whatever follows it. Question entries must carry a type and
    /// class we recognize - there is no way to answer one we don't.
    pub(crate) fn from_bytes(buf: &[u8], offset: usize) -> Result<(Self, usize), TriDnsError> {
        let (qname, pos) = name_from_bytes(buf, offset)?;
        let qtype = RecordType::from(read_u16(buf, pos)?);
        let qclass = RecordClass::from(read_u16(buf, pos + 2)?);
        if !qtype.known() {
            return Err(TriDnsError::Format(format!(
                "unknown qtype {} in question",
                qtype.as_u16()
            )));
        }
        if !qclass.known() {
            return Err(TriDnsError::Format(format!(
                "unknown qclass {} in question",
                qclass.as_u16()
            )));
        }
        Ok((
            Question {
                qname,
                qtype,
                qclass,
            },
            pos + 4,
        ))
    }

    /// The wire form of the question.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TriDnsError> {
        let mut retval = name_as_bytes(&self.qname)?;
        retval.extend(self.qtype.as_u16().to_be_bytes());
        retval.extend(self.qclass.as_u16().to_be_bytes());
        Ok(retval)
    }
}

/// The answer, authority, and additional sections all share the same
/// format: a variable number of resource records.
///
/// Ref [RFC1035 Section 4.1.3](https://www.rfc-editor.org/rfc/rfc1035.html#section-4.1.3)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRecord {
    /// A domain name to which this resource record pertains.
    pub name: Vec<u8>,
    /// The RR type code; unrecognized values ride along numerically.
    pub record_type: RecordType,
    /// The class of the data in the RDATA field.
    pub class: RecordClass,
    /// Seconds the record may be cached. Signed on the wire; the cache
    /// treats negative values as zero.
    pub ttl: i32,
    /// The RDATA payload, kept verbatim.
    pub rdata: Vec<u8>,
}

impl ResourceRecord {
    /// Decodes one record at `offset`. Unknown types and classes are
    /// preserved rather than rejected so OPT and friends pass through.
    pub(crate) fn from_bytes(buf: &[u8], offset: usize) -> Result<(Self, usize), TriDnsError> {
        let (name, pos) = name_from_bytes(buf, offset)?;
        let record_type = RecordType::from(read_u16(buf, pos)?);
        let class = RecordClass::from(read_u16(buf, pos + 2)?);
        let ttl = read_i32(buf, pos + 4)?;
        let rdlength = read_u16(buf, pos + 8)? as usize;
        let rdata = buf
            .get(pos + 10..pos + 10 + rdlength)
            .ok_or_else(|| TriDnsError::format("rdata runs past the end of the message"))?
            .to_vec();
        Ok((
            ResourceRecord {
                name,
                record_type,
                class,
                ttl,
                rdata,
            },
            pos + 10 + rdlength,
        ))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TriDnsError> {
        let mut retval = name_as_bytes(&self.name)?;
        retval.extend(self.record_type.as_u16().to_be_bytes());
        retval.extend(self.class.as_u16().to_be_bytes());
        retval.extend(self.ttl.to_be_bytes());
        if self.rdata.len() > u16::MAX as usize {
            return Err(TriDnsError::format("rdata longer than 65535 bytes"));
        }
        retval.extend((self.rdata.len() as u16).to_be_bytes());
        retval.extend(&self.rdata);
        Ok(retval)
    }

    /// A copy with the TTL replaced, used when the cache hands back
    /// decayed records.
    pub fn with_ttl(&self, ttl: i32) -> Self {
        ResourceRecord {
            ttl,
            ..self.clone()
        }
    }
}

/// One complete DNS message: header plus the four sections, in wire
/// order. Treated as immutable once built - every transformation hands
/// back a fresh message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    /// Parses a whole message. Everything that doesn't fit RFC1035
    /// section 4 is a format error; there are no partial results.
    pub fn from_bytes(buf: &[u8]) -> Result<Message, TriDnsError> {
        if buf.len() < HEADER_BYTES {
            return Err(TriDnsError::Format(format!(
                "message is {} bytes, the header alone is {HEADER_BYTES}",
                buf.len()
            )));
        }
        let header = Header::unpack_from_slice(&buf[0..HEADER_BYTES])
            .map_err(|error| TriDnsError::Format(format!("failed to unpack header: {error}")))?;

        let mut pos = HEADER_BYTES;
        let mut questions = Vec::new();
        for _ in 0..header.qdcount {
            let (question, next) = Question::from_bytes(buf, pos)?;
            questions.push(question);
            pos = next;
        }

        let mut sections: [Vec<ResourceRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for (section, count) in sections
            .iter_mut()
            .zip([header.ancount, header.nscount, header.arcount])
        {
            for _ in 0..count {
                let (record, next) = ResourceRecord::from_bytes(buf, pos)?;
                section.push(record);
                pos = next;
            }
        }
        let [answers, authorities, additionals] = sections;

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// The wire form. Section counts are recomputed from the actual
    /// section lengths, and the reserved header bits go out as zero.
    pub fn as_bytes(&self) -> Result<Vec<u8>, TriDnsError> {
        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.additionals.len() as u16;
        header.z = false;
        header.ad = false;
        header.cd = false;

        let mut retval: Vec<u8> = Vec::new();
        retval.extend(header.pack()?);
        for question in &self.questions {
            retval.extend(question.to_bytes()?);
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            retval.extend(record.to_bytes()?);
        }
        Ok(retval)
    }

    /// Builds a plain query, mostly useful to embedders and tests.
    pub fn query(id: u16, qname: &[u8], qtype: RecordType, qclass: RecordClass) -> Message {
        Message {
            header: Header {
                id,
                recursion_desired: true,
                qdcount: 1,
                ..Header::default()
            },
            questions: vec![Question {
                qname: qname.to_vec(),
                qtype,
                qclass,
            }],
            answers: vec![],
            authorities: vec![],
            additionals: vec![],
        }
    }

    pub fn is_response(&self) -> bool {
        self.header.qr == PacketType::Answer
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn rcode(&self) -> Rcode {
        self.header.rcode()
    }

    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// A successful response to this query: id copied, questions
    /// echoed, QR/RA set, RD and opcode preserved.
    pub fn make_response(
        &self,
        answers: Vec<ResourceRecord>,
        authorities: Vec<ResourceRecord>,
        additionals: Vec<ResourceRecord>,
    ) -> Message {
        Message {
            header: Header {
                id: self.header.id,
                qr: PacketType::Answer,
                opcode: self.header.opcode,
                authoritative: false,
                truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                z: false,
                ad: false,
                cd: false,
                rcode: (Rcode::NoError as u8).into(),
                qdcount: self.questions.len() as u16,
                ancount: answers.len() as u16,
                nscount: authorities.len() as u16,
                arcount: additionals.len() as u16,
            },
            questions: self.questions.clone(),
            answers,
            authorities,
            additionals,
        }
    }

    /// An error response to this query: like [Message::make_response]
    /// with empty sections and the given rcode.
    pub fn make_error(&self, rcode: Rcode) -> Message {
        let mut response = self.make_response(vec![], vec![], vec![]);
        response.header.rcode = (rcode as u8).into();
        response
    }

    /// The same message under a different id; the upstream client uses
    /// this in both directions.
    pub fn with_id(&self, id: u16) -> Message {
        let mut message = self.clone();
        message.header.id = id;
        message
    }

    /// A one-line summary for the logs: id, rcode, question, answer
    /// count.
    pub fn summary(&self) -> String {
        let question = match self.first_question() {
            Some(value) => value.to_string(),
            None => "<no question>".to_string(),
        };
        format!(
            "id={} {} {} answers={}",
            self.header.id,
            self.rcode(),
            question,
            self.answers.len()
        )
    }

    /// A copy fit for a too-small datagram: TC set, record sections
    /// dropped, questions kept.
    pub fn set_truncated(&self) -> Message {
        let mut message = self.clone();
        message.header.truncated = true;
        message.header.ancount = 0;
        message.header.nscount = 0;
        message.header.arcount = 0;
        message.answers = vec![];
        message.authorities = vec![];
        message.additionals = vec![];
        message
    }
}
