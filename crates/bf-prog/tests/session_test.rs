use std::time::Duration;

use bf_prog::crypt;
use bf_prog::device::{ACK, HANDSHAKE};
use bf_prog::transport::mock::MockLink;
use bf_prog::transport::{Transport, TransportConfig};
use bf_prog::{Error, RadioSession};

const BLOCK: usize = 0x40;

fn handshake(link: MockLink) -> MockLink {
    link.reply([0x06])
        .reply(*b"\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c\x0d\x0e\x0f")
        .reply(*b"UV-K5 MINI     ")
        .reply([0x06])
}

fn read_reply(address: u16, payload: &[u8]) -> Vec<u8> {
    let [hi, lo] = address.to_be_bytes();
    [&[b'R', hi, lo, payload.len() as u8][..], payload].concat()
}

fn open(link: MockLink) -> RadioSession<MockLink> {
    RadioSession::new(Transport::new(link, &TransportConfig::default()))
}

#[test]
fn settings_round_trip_through_a_session() {
    // an encrypted region on the radio, as the radio stores it
    let stored: Vec<u8> = (0..0x100).map(|i| (i * 7 % 256) as u8).collect();

    let mut link = handshake(MockLink::new());
    for (i, block) in stored.chunks(BLOCK).enumerate() {
        link.push_reply(read_reply(0x8000 + (i * BLOCK) as u16, block));
    }
    for _ in 0..stored.len() / BLOCK {
        link.push_reply([ACK]);
    }

    let mut session = open(link);
    let info = session.handshake().expect("handshake");
    assert_eq!(info.model_text().trim_end(), "UV-K5 MINI");

    let plain = session
        .read_memory(Some(5), 0x8000, stored.len())
        .expect("read");
    assert_eq!(plain, crypt::crypt(&stored, 5).unwrap());

    // writing the decrypted data back must send exactly what was stored
    session
        .write_memory(Some(5), 0x8000, &plain)
        .expect("write");

    let transport = session.close();
    let link = transport.into_inner();
    let writes = &link.writes()[HANDSHAKE.len() + stored.len() / BLOCK..];
    let sent: Vec<u8> = writes.iter().flat_map(|w| w[4..].to_vec()).collect();
    assert_eq!(sent, stored);
    assert_eq!(link.pending_replies(), 0);
}

#[test]
fn radio_type_byte_patch() {
    // read a 4 KiB region, change one byte and write it back, without crypt
    let mut region = vec![0xFFu8; 0x1000];
    region[0x255] = b'3';

    let mut link = handshake(MockLink::new());
    for (i, block) in region.chunks(BLOCK).enumerate() {
        link.push_reply(read_reply(0xF000 + (i * BLOCK) as u16, block));
    }
    for _ in 0..region.len() / BLOCK {
        link.push_reply([ACK]);
    }

    let mut session = open(link);
    session.handshake().unwrap();

    let mut memory = session.read_memory(None, 0xF000, 0x1000).unwrap();
    assert_eq!(memory, region);

    memory[0x255] = b'5';
    session.write_memory(None, 0xF000, &memory).unwrap();

    let link = session.close().into_inner();
    let writes = &link.writes()[HANDSHAKE.len() + 0x1000 / BLOCK..];
    assert_eq!(writes.len(), 0x40);
    // 0x255 lives in the block at 0xF240, offset 0x15
    assert_eq!(&writes[9][..4], [b'W', 0xF2, 0x40, 0x40]);
    assert_eq!(writes[9][4 + 0x15], b'5');
}

#[test]
fn silent_radio_times_out_during_handshake() {
    let config = TransportConfig {
        read_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let link = MockLink::new().with_read_latency(Duration::from_millis(200));
    let mut session = RadioSession::new(Transport::new(link, &config));

    let err = session.handshake().unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert!(matches!(session.read_block(0), Err(Error::HandshakeRequired)));
}

#[test]
fn errors_abort_the_transfer() {
    let mut link = handshake(MockLink::new());
    link.push_reply(read_reply(0xF000, &[0; BLOCK]));
    link.push_reply(read_reply(0xDEAD, &[0; BLOCK]));
    link.push_reply(read_reply(0xF080, &[0; BLOCK]));

    let mut session = open(link);
    session.handshake().unwrap();

    let err = session.read_memory(None, 0xF000, 3 * BLOCK).unwrap_err();

    assert!(err.to_string().contains("0xf040"), "{err}");
    assert_eq!(session.transport().link().pending_replies(), 1);
}
