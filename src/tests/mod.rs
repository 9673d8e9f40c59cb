mod codec;
mod e2e;

use crate::enums::{OpCode, Rcode};
use crate::utils::{hex_preview, name_as_bytes};
use enum_iterator::all;

#[test]
fn test_name_to_bytes() {
    let name = "cheese.world".as_bytes();
    assert_eq!(
        name_as_bytes(name).expect("Failed to encode name"),
        [6, 99, 104, 101, 101, 115, 101, 5, 119, 111, 114, 108, 100, 0]
    );
}

#[test]
fn test_short_name_to_bytes() {
    let name = "cheese".as_bytes();
    assert_eq!(
        name_as_bytes(name).expect("Failed to encode name"),
        [6, 99, 104, 101, 101, 115, 101, 0]
    );
}

#[test]
fn test_root_name_to_bytes() {
    assert_eq!(name_as_bytes(b"").expect("Failed to encode root"), [0]);
    assert_eq!(name_as_bytes(b".").expect("Failed to encode root"), [0]);
}

#[test]
fn test_hex_preview() {
    assert_eq!(hex_preview(&[], 8), "");
    assert_eq!(hex_preview(&[0xc0, 0x0c], 8), "c0 0c");
    assert_eq!(hex_preview(&[1, 2, 3, 4], 2), "01 02 ..");
}

#[test]
fn test_message_summary() {
    let query = crate::tests::harness::a_query(7, "sum.example");
    let response = query.make_error(crate::enums::Rcode::NameError);
    assert_eq!(
        response.summary(),
        "id=7 NXDOMAIN QNAME=sum.example QTYPE=A QCLASS=IN answers=0"
    );
}

#[test]
fn test_all_rcode_conversions() {
    for rcode in all::<Rcode>().collect::<Vec<_>>() {
        eprintln!("Testing {rcode:?}");
        if rcode != Rcode::Reserved {
            assert_eq!(rcode, Rcode::from(rcode as u8));
            assert_ne!(rcode.to_string(), "".to_string());
        } else {
            assert_eq!(rcode, Rcode::from(9u8));
        }
    }
}

#[test]
fn test_all_opcode_conversions() {
    for opcode in all::<OpCode>().collect::<Vec<_>>() {
        eprintln!("Testing {opcode:?}");
        if opcode != OpCode::Reserved {
            assert_eq!(opcode, OpCode::from(opcode as u8));
        } else {
            assert_eq!(opcode, OpCode::from(11u8));
        }
    }
}
