use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::protocol::{reply, PIN_COUNT};

/// One frame split off the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Data reply for the oldest outstanding command.
    Data(Bytes),
    /// Bit reply (`HIGH` is `true`) for the oldest outstanding command.
    Bit(bool),
    /// Pin `0..8` reported a change.
    PinChange(u8),
    /// Bytes received by the port's UART.
    UartRx(Bytes),
    /// Any other asynchronous event code.
    Event(u8),
}

impl Frame {
    /// Whether this frame resolves a reply descriptor.
    pub fn is_reply(&self) -> bool {
        matches!(self, Frame::Data(_) | Frame::Bit(_))
    }

    /// Bytes this frame occupied on the wire.
    pub fn wire_size(&self) -> usize {
        match self {
            Frame::Data(payload) => 1 + payload.len(),
            Frame::UartRx(payload) => 2 + payload.len(),
            Frame::Bit(_) | Frame::PinChange(_) | Frame::Event(_) => 1,
        }
    }
}

/// Split the next complete frame off the front of `src`.
///
/// `pending` is the payload size declared by the oldest outstanding reply
/// descriptor, or `None` when no command is waiting. It is only consulted when
/// the leading byte is a reply.
///
/// Returns `Ok(None)` when `src` is empty or holds only part of a frame; the
/// partial bytes stay in `src`. On success the frame's bytes are consumed.
/// Errors leave `src` untouched and mean the stream is out of step:
/// ```text
/// 0xD0 len payload..   UART receive chunk
/// 0xC0..=0xC7          pin 0..7 changed
/// 0xA0..=0xFF          other event
/// 0x84 payload..       data reply, length from `pending`
/// 0x82 / 0x83          HIGH / LOW reply
/// ```
pub fn decode_frame(src: &mut BytesMut, pending: Option<u8>) -> Result<Option<Frame>> {
    let Some(&lead) = src.first() else {
        return Ok(None);
    };

    if lead == reply::ASYNC_UART_RX {
        let Some(&len) = src.get(1) else {
            return Ok(None);
        };
        let len = usize::from(len);
        if src.len() < 2 + len {
            return Ok(None);
        }
        src.advance(2);
        return Ok(Some(Frame::UartRx(src.split_to(len).freeze())));
    }

    if lead >= reply::MIN_ASYNC {
        src.advance(1);
        let offset = lead.wrapping_sub(reply::ASYNC_PIN_CHANGE_N);
        if lead >= reply::ASYNC_PIN_CHANGE_N && usize::from(offset) < PIN_COUNT {
            return Ok(Some(Frame::PinChange(offset)));
        }
        return Ok(Some(Frame::Event(lead)));
    }

    let Some(size) = pending else {
        return Err(FrameError::UnexpectedReply(lead));
    };

    match lead {
        reply::DATA => {
            if size == 0 {
                return Err(FrameError::UnexpectedData);
            }
            let size = usize::from(size);
            if src.len() < 1 + size {
                return Ok(None);
            }
            src.advance(1);
            Ok(Some(Frame::Data(src.split_to(size).freeze())))
        }
        reply::HIGH | reply::LOW => {
            src.advance(1);
            Ok(Some(Frame::Bit(lead == reply::HIGH)))
        }
        other => Err(FrameError::UnknownReply(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut src = BytesMut::new();
        assert!(decode_frame(&mut src, None).unwrap().is_none());
        assert!(decode_frame(&mut src, Some(4)).unwrap().is_none());
    }

    #[test]
    fn uart_chunk_complete() {
        let mut src = buf(&[0xD0, 3, b'a', b'b', b'c', 0x82]);
        let frame = decode_frame(&mut src, None).unwrap().unwrap();
        assert_eq!(frame, Frame::UartRx(Bytes::from_static(b"abc")));
        assert_eq!(frame.wire_size(), 5);
        assert_eq!(src.as_ref(), &[0x82]);
    }

    #[test]
    fn uart_chunk_waits_for_length_and_payload() {
        let mut src = buf(&[0xD0]);
        assert!(decode_frame(&mut src, None).unwrap().is_none());
        assert_eq!(src.len(), 1);

        src.extend_from_slice(&[4, 1, 2]);
        assert!(decode_frame(&mut src, None).unwrap().is_none());
        assert_eq!(src.len(), 4);

        src.extend_from_slice(&[3, 4]);
        let frame = decode_frame(&mut src, None).unwrap().unwrap();
        assert_eq!(frame, Frame::UartRx(Bytes::from_static(&[1, 2, 3, 4])));
        assert!(src.is_empty());
    }

    #[test]
    fn pin_change_codes_map_to_pins() {
        for pin in 0..8u8 {
            let mut src = buf(&[0xC0 + pin]);
            assert_eq!(
                decode_frame(&mut src, None).unwrap(),
                Some(Frame::PinChange(pin))
            );
        }
    }

    #[test]
    fn other_async_codes_are_events() {
        for code in [0xA0, 0xBF, 0xC8, 0xCF, 0xD1, 0xFF] {
            let mut src = buf(&[code]);
            assert_eq!(decode_frame(&mut src, None).unwrap(), Some(Frame::Event(code)));
            assert!(src.is_empty());
        }
    }

    #[test]
    fn data_reply_uses_pending_size() {
        let mut src = buf(&[0x84, 9, 8, 7, 6, 0x83]);
        let frame = decode_frame(&mut src, Some(4)).unwrap().unwrap();
        assert_eq!(frame, Frame::Data(Bytes::from_static(&[9, 8, 7, 6])));
        assert!(frame.is_reply());
        assert_eq!(src.as_ref(), &[0x83]);
    }

    #[test]
    fn partial_data_reply_is_kept() {
        let mut src = buf(&[0x84, 1]);
        assert!(decode_frame(&mut src, Some(2)).unwrap().is_none());
        assert_eq!(src.as_ref(), &[0x84, 1]);
    }

    #[test]
    fn bit_replies_ignore_pending_size() {
        let mut src = buf(&[0x82, 0x83]);
        assert_eq!(decode_frame(&mut src, Some(0)).unwrap(), Some(Frame::Bit(true)));
        assert_eq!(decode_frame(&mut src, Some(3)).unwrap(), Some(Frame::Bit(false)));
    }

    #[test]
    fn reply_without_pending_command_is_desync() {
        let mut src = buf(&[0x82]);
        let err = decode_frame(&mut src, None).unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedReply(0x82)));
        assert!(err.is_desync());
        assert_eq!(src.len(), 1);
    }

    #[test]
    fn data_for_zero_size_descriptor_is_desync() {
        let mut src = buf(&[0x84, 1]);
        let err = decode_frame(&mut src, Some(0)).unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedData));
    }

    #[test]
    fn ack_marker_is_unknown_reply() {
        let mut src = buf(&[0x80]);
        let err = decode_frame(&mut src, Some(1)).unwrap_err();
        assert!(matches!(err, FrameError::UnknownReply(0x80)));
        assert!(err.is_desync());
    }
}
