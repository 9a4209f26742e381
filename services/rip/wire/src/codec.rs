//! Encoding and decoding of messages in transit.

use crate::error::WireError;
use crate::message::Message;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Largest frame a link will carry (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Encode a message into a versioned CBOR frame
pub fn encode(message: &Message) -> Result<Bytes, WireError> {
    let mut body = Vec::new();
    ciborium::into_writer(message, &mut body).map_err(|e| WireError::Encode(e.to_string()))?;

    let len = body.len() + 1;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::Size(len));
    }

    let mut frame = BytesMut::with_capacity(len);
    frame.put_u8(WIRE_VERSION);
    frame.put_slice(&body);

    trace!("Encoded {} frame ({} bytes)", message.kind(), len);
    Ok(frame.freeze())
}

/// Decode a frame produced by [`encode`]
pub fn decode(frame: &[u8]) -> Result<Message, WireError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(WireError::Size(frame.len()));
    }

    let (&version, body) = frame.split_first().ok_or(WireError::Empty)?;
    if version != WIRE_VERSION {
        return Err(WireError::Version(version));
    }

    ciborium::from_reader(body).map_err(|e| WireError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DataPacket, DistanceVector, LinkEvent};
    use crate::node::NodeKind;

    #[test]
    fn test_distance_vector_frame() {
        let dv = DistanceVector::new("s1".into())
            .with_entry("s2", 1)
            .with_entry("h3", 16);
        let msg = Message::DistanceVector(dv);

        let frame = encode(&msg).unwrap();
        assert_eq!(frame[0], WIRE_VERSION);
        assert_eq!(decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_data_payload_survives() {
        let msg = Message::Data(DataPacket::new(
            "h1".into(),
            "h2".into(),
            Bytes::from_static(b"\x00\x01payload"),
        ));
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            Message::Data(pkt) => assert_eq!(&pkt.payload[..], b"\x00\x01payload"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_frames() {
        assert!(matches!(decode(&[]), Err(WireError::Empty)));
        assert!(matches!(decode(&[9, 0xa0]), Err(WireError::Version(9))));
        assert!(matches!(
            decode(&[WIRE_VERSION, 0xff, 0x00]),
            Err(WireError::Malformed(_))
        ));

        let link = Message::Link(LinkEvent::down("s2".into(), NodeKind::Router));
        let mut frame = encode(&link).unwrap().to_vec();
        frame.truncate(frame.len() - 2);
        assert!(decode(&frame).is_err());
    }
}
