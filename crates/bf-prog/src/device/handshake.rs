/// Payload of the final handshake step. The radio doesn't seem to care much about its meaning,
/// but it must be sent byte for byte.
const SEND_COMMAND: &[u8; 25] = &[
    b'S', b'E', b'N', b'D', //
    0x21, 0x05, 0x0D, 0x01, 0x01, 0x01, 0x04, 0x11, //
    0x08, 0x05, 0x0D, 0x0D, 0x01, 0x11, 0x0F, 0x09, //
    0x12, 0x09, 0x10, 0x04, 0x00,
];

pub const IDENT_LEN: usize = 16;
pub const MODEL_LEN: usize = 15;

/// The steps of the programming-mode handshake: what to send and how many bytes to expect back.
///
/// Every step advances the radio's state machine, so the table runs once and strictly in order.
pub const HANDSHAKE: &[(&[u8], usize)] = &[
    (b"PROGRAMBFNORMALU", 1),
    (b"F", IDENT_LEN),
    (b"M", MODEL_LEN),
    (SEND_COMMAND, 1),
];

/// Replies received during the handshake, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub program_ack: u8,
    pub ident: [u8; IDENT_LEN],
    pub model: [u8; MODEL_LEN],
    pub send_reply: u8,
}

impl HandshakeInfo {
    pub(super) fn from_replies(replies: &[Vec<u8>]) -> Option<Self> {
        let [program, ident, model, send] = replies else {
            return None;
        };

        Some(Self {
            program_ack: *program.first()?,
            ident: ident.as_slice().try_into().ok()?,
            model: model.as_slice().try_into().ok()?,
            send_reply: *send.first()?,
        })
    }

    /// The model reply as text (non-ASCII bytes are replaced)
    pub fn model_text(&self) -> String {
        String::from_utf8_lossy(&self.model).into_owned()
    }
}
