use crate::enums::{RecordClass, RecordType};
use crate::error::TriDnsError;
use crate::message::{Message, Question, ResourceRecord};
use crate::rdata::RData;
use crate::tests::harness::{a_query, a_record};
use crate::utils::{name_as_bytes, name_from_bytes};

#[test]
fn test_query_wire_format() {
    let query = a_query(0x1234, "example.com");
    let bytes = query.as_bytes().expect("Failed to serialize query");
    let expected: Vec<u8> = vec![
        /* header - 12 bytes */
        0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        /* question */
        0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01,
        0x00, 0x01,
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn test_build_iana_org_a_reply() {
    let query = a_query(41840, "iana.org");
    let reply = query.make_response(vec![a_record("iana.org", 350, [192, 0, 43, 8])], vec![], vec![]);
    let reply_bytes = reply.as_bytes().expect("Failed to serialize reply");
    let expected_bytes: Vec<u8> = vec![
        /* header - 12 bytes */
        0xa3, 0x70, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        /* question - 14 bytes */
        0x04, 0x69, 0x61, 0x6e, 0x61, 0x03, 0x6f, 0x72, 0x67, 0x00, 0x00, 0x01, 0x00, 0x01,
        /* answer - no compression on encode */
        0x04, 0x69, 0x61, 0x6e, 0x61, 0x03, 0x6f, 0x72, 0x67, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x00, 0x01, 0x5e, 0x00, 0x04, 0xc0, 0x00, 0x2b, 0x08,
    ];
    assert_eq!(reply_bytes, expected_bytes);
}

#[test]
fn test_roundtrip_structural() {
    let query = a_query(7777, "round.trip.example");
    let response = query.make_response(
        vec![
            a_record("round.trip.example", 300, [10, 0, 0, 1]),
            ResourceRecord {
                name: b"round.trip.example".to_vec(),
                record_type: RecordType::TXT,
                class: RecordClass::Internet,
                ttl: 60,
                rdata: RData::txt_bytes(b"hello world").expect("txt rdata"),
            },
        ],
        vec![],
        vec![ResourceRecord {
            // an unrecognized type (SVCB) must ride along untouched
            name: b"round.trip.example".to_vec(),
            record_type: RecordType::Unknown(64),
            class: RecordClass::Internet,
            ttl: 30,
            rdata: vec![0xde, 0xad, 0xbe, 0xef],
        }],
    );
    let bytes = response.as_bytes().expect("Failed to serialize");
    let parsed = Message::from_bytes(&bytes).expect("Failed to parse");
    assert_eq!(parsed, response);
    // and the bytes themselves are stable
    assert_eq!(parsed.as_bytes().expect("Failed to re-serialize"), bytes);
}

#[test]
fn test_parse_rejects_short_messages() {
    for len in 0..crate::HEADER_BYTES {
        let buf = vec![0u8; len];
        assert!(Message::from_bytes(&buf).is_err(), "{len} bytes parsed?");
    }
}

#[test]
fn test_parse_compressed_answer_name() {
    let buf: Vec<u8> = vec![
        /* header: id=1, response, rd+ra, qd=1 an=1 */
        0x00, 0x01, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        /* question: example.com A IN, name at offset 12 */
        0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01,
        0x00, 0x01, /* answer: name is a pointer to offset 12 */
        0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3c, 0x00, 0x04, 0x01, 0x02, 0x03,
        0x04,
    ];
    let message = Message::from_bytes(&buf).expect("Failed to parse compressed answer");
    assert_eq!(message.answers.len(), 1);
    assert_eq!(message.answers[0].name, b"example.com".to_vec());
    assert_eq!(message.answers[0].ttl, 60);
    assert_eq!(message.answers[0].rdata, vec![1, 2, 3, 4]);
}

#[test]
/// A question name whose first byte points at itself must come back as
/// a format error, not a hang.
fn test_compression_loop_attack() {
    let buf: Vec<u8> = vec![
        0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, /* header */
        0xc0, 0x0c, /* a pointer to offset 12: itself */
    ];
    assert_eq!(buf.len(), 14);
    match Message::from_bytes(&buf) {
        Err(TriDnsError::Format(_)) => {}
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
/// A chain of backwards pointers is legal up to ten hops and a format
/// error past that.
fn test_pointer_hop_budget() {
    // offset 0 is a root byte, then pointers at 1, 3, 5, ... each
    // targeting the previous one
    let mut buf: Vec<u8> = vec![0x00];
    for hop in 0..11u8 {
        let target = if hop == 0 { 0 } else { 2 * hop as usize - 1 };
        buf.push(0xc0);
        buf.push(target as u8);
    }
    // starting at the 10th pointer takes exactly ten hops
    let ten_hops_start = 2 * 10 - 1;
    let (name, _) = name_from_bytes(&buf, ten_hops_start).expect("ten hops should decode");
    assert!(name.is_empty());
    // the 11th pointer goes over budget
    let eleven_hops_start = 2 * 11 - 1;
    assert!(name_from_bytes(&buf, eleven_hops_start).is_err());
}

#[test]
/// Valid-looking pointers that keep accumulating labels must trip the
/// 255-byte name limit before they can chew through memory.
fn test_name_length_bomb() {
    let mut buf: Vec<u8> = vec![63];
    buf.extend(vec![b'a'; 63]);
    // a pointer straight back to the label; every pass adds 63 bytes
    buf.push(0xc0);
    buf.push(0x00);
    match name_from_bytes(&buf, 64) {
        Err(TriDnsError::Format(reason)) => assert!(reason.contains("255"), "{reason}"),
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn test_reserved_label_bits_rejected() {
    for first_byte in [0b0100_0000u8, 0b1000_0000u8] {
        let buf = vec![first_byte, 0x00];
        assert!(name_from_bytes(&buf, 0).is_err());
    }
}

#[test]
fn test_name_encode_decode_roundtrip() {
    for name in ["example.com", "a.b.c.d.e", "MiXeD.CaSe.Example", "x"] {
        let encoded = name_as_bytes(name.as_bytes()).expect("Failed to encode");
        let (decoded, consumed) = name_from_bytes(&encoded, 0).expect("Failed to decode");
        assert_eq!(decoded, name.as_bytes().to_vec());
        assert_eq!(consumed, encoded.len());
    }
}

#[test]
fn test_name_encode_strips_one_trailing_dot() {
    assert_eq!(
        name_as_bytes(b"example.com.").expect("Failed to encode"),
        name_as_bytes(b"example.com").expect("Failed to encode"),
    );
    // two trailing dots leave an empty label behind
    assert!(name_as_bytes(b"example.com..").is_err());
}

#[test]
fn test_name_encode_label_limits() {
    let long_label = vec![b'a'; 64];
    assert!(name_as_bytes(&long_label).is_err());
    let just_fits = vec![b'a'; 63];
    assert!(name_as_bytes(&just_fits).is_ok());

    // four 63-byte labels push the encoded form past 255 bytes
    let mut too_long: Vec<u8> = Vec::new();
    for _ in 0..4 {
        too_long.extend(vec![b'a'; 63]);
        too_long.push(b'.');
    }
    too_long.pop();
    assert!(name_as_bytes(&too_long).is_err());
}

#[test]
fn test_unknown_qtype_in_question_is_rejected() {
    let mut buf = a_query(5, "example.com")
        .as_bytes()
        .expect("Failed to serialize");
    // qtype lives in the last four bytes; 64 is SVCB, which we don't
    // recognize
    let qtype_at = buf.len() - 4;
    buf[qtype_at] = 0x00;
    buf[qtype_at + 1] = 64;
    assert!(Message::from_bytes(&buf).is_err());

    // same for a class we don't know
    let mut buf = a_query(5, "example.com")
        .as_bytes()
        .expect("Failed to serialize");
    let qclass_at = buf.len() - 2;
    buf[qclass_at] = 0x00;
    buf[qclass_at + 1] = 2;
    assert!(Message::from_bytes(&buf).is_err());
}

#[test]
fn test_truncated_question_is_rejected() {
    let full = a_query(5, "iana.org").as_bytes().expect("Failed to serialize");
    for len in crate::HEADER_BYTES..full.len() {
        assert!(
            Message::from_bytes(&full[..len]).is_err(),
            "parsed at {len} of {} bytes",
            full.len()
        );
    }
}

#[test]
fn test_reserved_header_bits_written_as_zero() {
    let mut buf = a_query(5, "example.com")
        .as_bytes()
        .expect("Failed to serialize");
    // flip AD and CD in the raw query
    buf[3] |= 0b0011_0000;
    let parsed = Message::from_bytes(&buf).expect("Failed to parse");
    assert!(parsed.header.ad);
    assert!(parsed.header.cd);
    let reserialized = parsed.as_bytes().expect("Failed to serialize");
    assert_eq!(reserialized[3] & 0b0111_0000, 0);
}

#[test]
fn test_negative_ttl_survives_parsing() {
    let query = a_query(9, "neg.example");
    let response = query.make_response(vec![a_record("neg.example", -1, [1, 1, 1, 1])], vec![], vec![]);
    let bytes = response.as_bytes().expect("Failed to serialize");
    let parsed = Message::from_bytes(&bytes).expect("Failed to parse");
    assert_eq!(parsed.answers[0].ttl, -1);
}

#[test]
fn test_rdata_a_and_aaaa() {
    let record = a_record("a.example", 60, [192, 0, 2, 1]);
    match RData::parse(&record, &[]).expect("Failed to parse A rdata") {
        RData::A(address) => assert_eq!(address.octets(), [192, 0, 2, 1]),
        other => panic!("wrong rdata: {other:?}"),
    }

    let record = ResourceRecord {
        name: b"aaaa.example".to_vec(),
        record_type: RecordType::AAAA,
        class: RecordClass::Internet,
        ttl: 60,
        rdata: vec![0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    };
    match RData::parse(&record, &[]).expect("Failed to parse AAAA rdata") {
        RData::AAAA(address) => assert_eq!(address.to_string(), "2001:db8::1"),
        other => panic!("wrong rdata: {other:?}"),
    }

    let bad = ResourceRecord {
        rdata: vec![1, 2, 3],
        ..a_record("a.example", 60, [0, 0, 0, 0])
    };
    assert!(RData::parse(&bad, &[]).is_err());
}

#[test]
fn test_rdata_cname_follows_compression() {
    // message whose question name sits at offset 12, used as the
    // pointer target for the CNAME rdata
    let message = a_query(3, "example.com")
        .as_bytes()
        .expect("Failed to serialize");
    let record = ResourceRecord {
        name: b"www.example.com".to_vec(),
        record_type: RecordType::CNAME,
        class: RecordClass::Internet,
        ttl: 60,
        rdata: vec![0x03, b'w', b'w', b'w', 0xc0, 0x0c],
    };
    match RData::parse(&record, &message).expect("Failed to parse CNAME rdata") {
        RData::CNAME(name) => assert_eq!(name, b"www.example.com".to_vec()),
        other => panic!("wrong rdata: {other:?}"),
    }
}

#[test]
fn test_rdata_mx_txt_soa() {
    let mx = ResourceRecord {
        name: b"example.com".to_vec(),
        record_type: RecordType::MX,
        class: RecordClass::Internet,
        ttl: 60,
        rdata: {
            let mut rdata = vec![0x00, 0x0a];
            rdata.extend(name_as_bytes(b"mail.example.com").expect("Failed to encode"));
            rdata
        },
    };
    match RData::parse(&mx, &[]).expect("Failed to parse MX rdata") {
        RData::MX {
            preference,
            exchange,
        } => {
            assert_eq!(preference, 10);
            assert_eq!(exchange, b"mail.example.com".to_vec());
        }
        other => panic!("wrong rdata: {other:?}"),
    }

    let txt = ResourceRecord {
        name: b"example.com".to_vec(),
        record_type: RecordType::TXT,
        class: RecordClass::Internet,
        ttl: 60,
        rdata: vec![0x02, b'h', b'i', 0x05, b't', b'h', b'e', b'r', b'e'],
    };
    match RData::parse(&txt, &[]).expect("Failed to parse TXT rdata") {
        RData::TXT(strings) => {
            assert_eq!(strings, vec![b"hi".to_vec(), b"there".to_vec()]);
        }
        other => panic!("wrong rdata: {other:?}"),
    }

    let soa = ResourceRecord {
        name: b"example.com".to_vec(),
        record_type: RecordType::SOA,
        class: RecordClass::Internet,
        ttl: 60,
        rdata: {
            let mut rdata = name_as_bytes(b"ns1.example.com").expect("Failed to encode");
            rdata.extend(name_as_bytes(b"hostmaster.example.com").expect("Failed to encode"));
            for field in [2024010101u32, 7200, 3600, 1209600, 300] {
                rdata.extend(field.to_be_bytes());
            }
            rdata
        },
    };
    match RData::parse(&soa, &[]).expect("Failed to parse SOA rdata") {
        RData::SOA {
            mname,
            rname,
            serial,
            minimum,
            ..
        } => {
            assert_eq!(mname, b"ns1.example.com".to_vec());
            assert_eq!(rname, b"hostmaster.example.com".to_vec());
            assert_eq!(serial, 2024010101);
            assert_eq!(minimum, 300);
        }
        other => panic!("wrong rdata: {other:?}"),
    }
}

#[test]
/// An OPT pseudo-record in the additional section survives a
/// decode/encode cycle untouched, rdata and oddball "class" included.
fn test_opt_record_passes_through() {
    let mut query = a_query(11, "edns.example");
    query.additionals.push(ResourceRecord {
        name: vec![],
        record_type: RecordType::OPT,
        // OPT abuses the class field for the requestor's payload size
        class: RecordClass::from(4096u16),
        ttl: 0,
        rdata: vec![],
    });
    // the serializer recomputes counts; keep the in-memory header in
    // step so the parsed copy compares equal
    query.header.arcount = 1;
    let bytes = query.as_bytes().expect("Failed to serialize");
    let parsed = Message::from_bytes(&bytes).expect("Failed to parse");
    assert_eq!(parsed, query);
    assert_eq!(parsed.additionals[0].record_type, RecordType::OPT);
    assert_eq!(parsed.additionals[0].class.as_u16(), 4096);
    // the root owner name went out as a single zero byte
    assert_eq!(parsed.additionals[0].name, Vec::<u8>::new());
}

#[test]
fn test_question_display() {
    let question = Question {
        qname: b"display.example".to_vec(),
        qtype: RecordType::TXT,
        qclass: RecordClass::Internet,
    };
    assert_eq!(
        question.to_string(),
        "QNAME=display.example QTYPE=TXT QCLASS=IN"
    );
}
