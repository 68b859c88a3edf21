//! OSC packet helpers on top of `rosc`
//!
//! AbletonOSC only exchanges single messages, so bundles are rejected.
//! Flags arrive either as OSC booleans or as 0/1 integers.

use rosc::{OscMessage, OscPacket, OscType};

use crate::error::RemoteError;

/// Build a message from an address and its arguments
pub fn message(address: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: address.to_string(),
        args,
    }
}

/// Encode one message to a UDP payload
pub fn encode(msg: &OscMessage) -> Result<Vec<u8>, RemoteError> {
    rosc::encoder::encode(&OscPacket::Message(msg.clone()))
        .map_err(|e| RemoteError::Protocol(format!("cannot encode '{}': {:?}", msg.addr, e)))
}

/// Decode a UDP payload holding a single message
pub fn decode(data: &[u8]) -> Result<OscMessage, RemoteError> {
    let (_, packet) = rosc::decoder::decode_udp(data)
        .map_err(|e| RemoteError::Protocol(format!("invalid OSC packet: {:?}", e)))?;

    match packet {
        OscPacket::Message(msg) => Ok(msg),
        OscPacket::Bundle(_) => Err(RemoteError::Protocol("unexpected OSC bundle".into())),
    }
}

pub fn as_int(arg: &OscType) -> Option<i32> {
    match *arg {
        OscType::Int(v) => Some(v),
        OscType::Long(v) => i32::try_from(v).ok(),
        OscType::Float(v) if v.fract() == 0.0 => Some(v as i32),
        OscType::Bool(b) => Some(b as i32),
        _ => None,
    }
}

pub fn as_bool(arg: &OscType) -> Option<bool> {
    match *arg {
        OscType::Bool(b) => Some(b),
        OscType::Int(v) => Some(v != 0),
        OscType::Long(v) => Some(v != 0),
        OscType::Float(v) => Some(v != 0.0),
        _ => None,
    }
}

pub fn as_str(arg: &OscType) -> Option<&str> {
    match arg {
        OscType::String(s) => Some(s),
        _ => None,
    }
}

/// Address and arguments on one line, for trace logs
pub fn describe(msg: &OscMessage) -> String {
    let mut out = msg.addr.clone();
    for arg in &msg.args {
        match arg {
            OscType::Int(v) => out.push_str(&format!(" {}", v)),
            OscType::Float(v) => out.push_str(&format!(" {}", v)),
            OscType::String(s) => out.push_str(&format!(" \"{}\"", s)),
            OscType::Bool(b) => out.push_str(&format!(" {}", b)),
            other => out.push_str(&format!(" {:?}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_command_layout() {
        let msg = message(
            "/live/clip_slot/duplicate_clip_to",
            vec![OscType::Int(0), OscType::Int(2), OscType::Int(0), OscType::Int(3)],
        );
        let bytes = encode(&msg).unwrap();

        // 33-char address pads to 36, ",iiii" pads to 8, four ints
        assert_eq!(bytes.len(), 36 + 8 + 16);
        assert_eq!(&bytes[36..41], b",iiii");
        assert_eq!(&bytes[bytes.len() - 4..], &[0, 0, 0, 3]);
    }

    #[test]
    fn test_decode_reply() {
        let reply = message(
            "/live/track/get/name",
            vec![OscType::Int(1), OscType::String("Drums".into())],
        );
        let decoded = decode(&encode(&reply).unwrap()).unwrap();

        assert_eq!(decoded, reply);
        assert_eq!(as_str(&decoded.args[1]), Some("Drums"));
        assert_eq!(describe(&decoded), "/live/track/get/name 1 \"Drums\"");
    }

    #[test]
    fn test_flag_and_number_coercion() {
        assert_eq!(as_bool(&OscType::Bool(true)), Some(true));
        assert_eq!(as_bool(&OscType::Int(0)), Some(false));
        assert_eq!(as_bool(&OscType::String("x".into())), None);
        assert_eq!(as_int(&OscType::Float(3.0)), Some(3));
        assert_eq!(as_int(&OscType::Float(3.5)), None);
    }

    #[test]
    fn test_decode_rejects_garbage_and_bundles() {
        assert!(matches!(decode(b"no-terminator"), Err(RemoteError::Protocol(_))));

        let bundle = rosc::encoder::encode(&OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![OscPacket::Message(message("/x", vec![]))],
        }))
        .unwrap();
        assert!(matches!(decode(&bundle), Err(RemoteError::Protocol(_))));
    }
}
