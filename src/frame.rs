use crate::error::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continue),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub final_fragment: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(final_fragment: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            final_fragment,
            opcode,
            payload,
        }
    }
}

/// Outcome of trying to pull one frame out of a byte buffer. `NeedMoreData`
/// leaves the buffer untouched, per spec.md §4.1 step 6.
pub enum DecodeOutcome {
    Frame { frame: Frame, consumed: usize },
    NeedMoreData,
}

/// Who the decoder is running as. Governs the masking-discipline check
/// (spec.md I6): a server must reject unmasked client frames, a client
/// must reject masked server frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Pure decode of one frame out of `buf`, per spec.md §4.1. Never
/// allocates a payload buffer larger than `max_buffer_length`; returns
/// `Error::PayloadTooLarge` instead so the caller can force-close with
/// code 1009 without ever materializing an attacker-declared huge length.
pub fn decode_frame(buf: &[u8], role: Role, max_buffer_length: usize) -> Result<DecodeOutcome, Error> {
    if buf.len() < 2 {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    let b0 = buf[0];
    let b1 = buf[1];

    let final_fragment = (b0 & 0b1000_0000) != 0;
    let rsv1 = (b0 & 0b0100_0000) != 0;
    let rsv2 = (b0 & 0b0010_0000) != 0;
    let rsv3 = (b0 & 0b0001_0000) != 0;
    if rsv1 || rsv2 || rsv3 {
        return Err(Error::RSVNotZero);
    }

    let opcode = OpCode::from(b0 & 0b0000_1111)?;
    if !final_fragment && opcode.is_control() {
        return Err(Error::ControlFramesFragmented);
    }

    let masked = (b1 & 0b1000_0000) != 0;
    // Frames from a client MUST be masked, frames from a server MUST NOT be (I6).
    let masking_ok = match role {
        Role::Server => masked,
        Role::Client => !masked,
    };
    if !masking_ok {
        return Err(Error::MaskingDiscipline);
    }

    let len7 = (b1 & 0b0111_1111) as usize;
    if opcode.is_control() && len7 > 125 {
        return Err(Error::ControlFramePayloadSize);
    }

    let mut offset = 2usize;
    let payload_len: u64;
    match len7 {
        126 => {
            if buf.len() < offset + 2 {
                return Ok(DecodeOutcome::NeedMoreData);
            }
            payload_len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as u64;
            offset += 2;
        }
        127 => {
            if buf.len() < offset + 8 {
                return Ok(DecodeOutcome::NeedMoreData);
            }
            let mut be = [0u8; 8];
            be.copy_from_slice(&buf[offset..offset + 8]);
            payload_len = u64::from_be_bytes(be);
            offset += 8;
        }
        n => payload_len = n as u64,
    }

    if payload_len > max_buffer_length as u64 {
        return Err(Error::PayloadTooLarge);
    }
    let payload_len = payload_len as usize;

    let mask_key = if masked {
        if buf.len() < offset + 4 {
            return Ok(DecodeOutcome::NeedMoreData);
        }
        let mut key = [0u8; 4];
        key.copy_from_slice(&buf[offset..offset + 4]);
        offset += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < offset + payload_len {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    let mut payload = buf[offset..offset + payload_len].to_vec();
    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }
    offset += payload_len;

    Ok(DecodeOutcome::Frame {
        frame: Frame::new(final_fragment, opcode, payload),
        consumed: offset,
    })
}

fn write_length(out: &mut Vec<u8>, masked: bool, len: usize) {
    let mask_bit = if masked { 0b1000_0000u8 } else { 0 };
    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 65535 {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        // spec.md §4.1: a systems language may use a native u64 here;
        // the source's 2^53 floating-point limit does not apply.
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Encodes one frame, masking the payload with a fresh random key when
/// `masked` is set. Never mutates the caller's `payload` — always
/// copies before XOR-masking (spec.md §9).
fn encode_frame(final_fragment: bool, opcode: OpCode, payload: &[u8], masked: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    let first_byte = ((final_fragment as u8) << 7) | opcode.as_u8();
    out.push(first_byte);
    write_length(&mut out, masked, payload.len());

    if masked {
        let mut rng = StdRng::from_rng(rand::thread_rng());
        let key = [
            rng.random::<u8>(),
            rng.random::<u8>(),
            rng.random::<u8>(),
            rng.random::<u8>(),
        ];
        out.extend_from_slice(&key);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    } else {
        out.extend_from_slice(payload);
    }

    out
}

pub fn create_text_frame(text: &str, masked: bool) -> Vec<u8> {
    encode_frame(true, OpCode::Text, text.as_bytes(), masked)
}

pub fn create_binary_frame(payload: &[u8], masked: bool, first: bool, fin: bool) -> Vec<u8> {
    let opcode = if first { OpCode::Binary } else { OpCode::Continue };
    encode_frame(fin, opcode, payload, masked)
}

/// Close code 1005 (spec.md §6) means "no code" — the frame carries an
/// empty payload in that case, same as when `code` is `None`.
pub fn create_close_frame(code: Option<u16>, reason: &str, masked: bool) -> Vec<u8> {
    let payload = match code {
        Some(code) if code != 1005 => {
            let mut p = Vec::with_capacity(2 + reason.len());
            p.extend_from_slice(&code.to_be_bytes());
            p.extend_from_slice(reason.as_bytes());
            p
        }
        _ => Vec::new(),
    };
    encode_frame(true, OpCode::Close, &payload, masked)
}

pub fn create_ping_frame(data: &[u8], masked: bool) -> Vec<u8> {
    encode_frame(true, OpCode::Ping, data, masked)
}

pub fn create_pong_frame(data: &[u8], masked: bool) -> Vec<u8> {
    encode_frame(true, OpCode::Pong, data, masked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrip() {
        for byte in [0x0, 0x1, 0x2, 0x8, 0x9, 0xA] {
            let op = OpCode::from(byte).unwrap();
            assert_eq!(op.as_u8(), byte);
        }
        assert!(OpCode::from(0x3).is_err());
    }

    #[test]
    fn control_frame_is_control() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(!OpCode::Continue.is_control());
    }

    #[test]
    fn decode_needs_more_data_on_short_header() {
        let buf = [0x81u8];
        let outcome = decode_frame(&buf, Role::Client, 1 << 20).unwrap();
        assert!(matches!(outcome, DecodeOutcome::NeedMoreData));
    }

    #[test]
    fn encode_decode_masked_roundtrip() {
        let encoded = create_text_frame("Hello", true);
        let outcome = decode_frame(&encoded, Role::Server, 1 << 20).unwrap();
        match outcome {
            DecodeOutcome::Frame { frame, consumed } => {
                assert_eq!(consumed, encoded.len());
                assert_eq!(frame.opcode, OpCode::Text);
                assert_eq!(frame.payload, b"Hello");
                assert!(frame.final_fragment);
            }
            _ => panic!("expected a full frame"),
        }
    }

    #[test]
    fn server_rejects_unmasked_client_frame() {
        let encoded = create_text_frame("hi", false);
        let err = decode_frame(&encoded, Role::Server, 1 << 20).unwrap_err();
        assert!(matches!(err, Error::MaskingDiscipline));
    }

    #[test]
    fn client_rejects_masked_server_frame() {
        let encoded = create_text_frame("hi", true);
        let err = decode_frame(&encoded, Role::Client, 1 << 20).unwrap_err();
        assert!(matches!(err, Error::MaskingDiscipline));
    }

    #[test]
    fn length_boundary_126() {
        let payload = vec![0u8; 126];
        let encoded = create_binary_frame(&payload, false, true, true);
        assert_eq!(encoded[1], 126);
        let outcome = decode_frame(&encoded, Role::Client, 1 << 20).unwrap();
        match outcome {
            DecodeOutcome::Frame { frame, .. } => assert_eq!(frame.payload.len(), 126),
            _ => panic!("expected a full frame"),
        }
    }

    #[test]
    fn length_boundary_65536() {
        let payload = vec![0u8; 65536];
        let encoded = create_binary_frame(&payload, false, true, true);
        assert_eq!(encoded[1], 127);
        let outcome = decode_frame(&encoded, Role::Client, (1 << 20) + 65536).unwrap();
        match outcome {
            DecodeOutcome::Frame { frame, .. } => assert_eq!(frame.payload.len(), 65536),
            _ => panic!("expected a full frame"),
        }
    }

    #[test]
    fn control_frame_with_fin_zero_is_error() {
        let buf = [0x09u8, 0x00];
        let err = decode_frame(&buf, Role::Client, 1 << 20).unwrap_err();
        assert!(matches!(err, Error::ControlFramesFragmented));
    }

    #[test]
    fn oversize_frame_is_rejected_without_allocating() {
        let mut buf = vec![0x82u8, 127];
        buf.extend_from_slice(&(5u64 * 1024 * 1024 * 1024).to_be_bytes());
        let err = decode_frame(&buf, Role::Client, 2 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge));
    }

    #[test]
    fn close_frame_code_1005_has_empty_payload() {
        let encoded = create_close_frame(Some(1005), "ignored", false);
        let outcome = decode_frame(&encoded, Role::Client, 1 << 20).unwrap();
        match outcome {
            DecodeOutcome::Frame { frame, .. } => assert!(frame.payload.is_empty()),
            _ => panic!("expected a full frame"),
        }
    }

    #[test]
    fn masked_encode_does_not_mutate_caller_buffer() {
        let payload = vec![1u8, 2, 3, 4];
        let original = payload.clone();
        let _ = create_binary_frame(&payload, true, true, true);
        assert_eq!(payload, original);
    }
}
