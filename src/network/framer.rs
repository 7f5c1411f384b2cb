// Frame layer: 3-byte length + 1-byte sequence id, 16MB payload chunks

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{ProtocolError, Result};

pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload one frame can carry. Logical packets at or above this
/// size are split across frames and terminated by a short (possibly empty)
/// final frame.
pub const MAX_FRAME_PAYLOAD: usize = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_length: u32,
    pub sequence_id: u8,
}

impl FrameHeader {
    pub fn from_bytes(bytes: [u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            payload_length: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
            sequence_id: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; FRAME_HEADER_LEN] {
        let len = self.payload_length.to_le_bytes();
        [len[0], len[1], len[2], self.sequence_id]
    }
}

/// Reads and writes logical packets over a byte stream, tracking the
/// per-connection sequence id.
///
/// The counter counts every frame in both directions and wraps mod 256.
/// Callers reset it at each command boundary; the handshake runs on one
/// uninterrupted sequence.
pub struct PacketFramer<S> {
    stream: S,
    sequence: u8,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PacketFramer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Reads one logical packet, reassembling split frames.
    ///
    /// A frame whose sequence id does not match the expected counter is
    /// rejected without advancing the counter.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header_bytes = [0u8; FRAME_HEADER_LEN];
            self.stream.read_exact(&mut header_bytes).await?;
            let header = FrameHeader::from_bytes(header_bytes);
            if header.sequence_id != self.sequence {
                return Err(ProtocolError::violation(format!(
                    "expected sequence id {}, got {}",
                    self.sequence, header.sequence_id
                )));
            }
            self.sequence = self.sequence.wrapping_add(1);

            let len = header.payload_length as usize;
            let start = payload.len();
            payload.resize(start + len, 0);
            self.stream.read_exact(&mut payload[start..]).await?;
            if len < MAX_FRAME_PAYLOAD {
                break;
            }
        }
        Ok(payload)
    }

    /// Writes one logical packet, splitting it into max-size frames.
    ///
    /// An empty payload still produces one zero-length frame, and a payload
    /// that is an exact multiple of the maximum is terminated by one.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let mut rest = payload;
        loop {
            let len = rest.len().min(MAX_FRAME_PAYLOAD);
            let header = FrameHeader {
                payload_length: len as u32,
                sequence_id: self.sequence,
            };
            let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + len);
            buf.put_slice(&header.to_bytes());
            buf.put_slice(&rest[..len]);
            self.stream.write_all(&buf).await?;
            self.sequence = self.sequence.wrapping_add(1);
            rest = &rest[len..];
            if len < MAX_FRAME_PAYLOAD {
                break;
            }
        }
        self.stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::codes;
    use crate::protocol::{CapabilityFlags, PacketCoder, SqlError};
    use std::io::Cursor;

    fn framer_over(data: Vec<u8>) -> PacketFramer<Cursor<Vec<u8>>> {
        PacketFramer::new(Cursor::new(data))
    }

    async fn written_bytes(payload: &[u8]) -> Vec<u8> {
        let mut framer = framer_over(Vec::new());
        framer.write_frame(payload).await.unwrap();
        framer.into_inner().into_inner()
    }

    /// Walks a raw byte buffer and collects (payload_length, sequence_id)
    /// per frame.
    fn frame_lengths(mut bytes: &[u8]) -> Vec<(usize, u8)> {
        let mut frames = Vec::new();
        while !bytes.is_empty() {
            let header = FrameHeader::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let len = header.payload_length as usize;
            frames.push((len, header.sequence_id));
            bytes = &bytes[FRAME_HEADER_LEN + len..];
        }
        frames
    }

    #[test]
    fn test_header_round_trip() {
        let header = FrameHeader::from_bytes([0xEF, 0xCD, 0xAB, 7]);
        assert_eq!(header.payload_length, 0xABCDEF);
        assert_eq!(header.sequence_id, 7);
        assert_eq!(header.to_bytes(), [0xEF, 0xCD, 0xAB, 7]);
    }

    #[tokio::test]
    async fn test_writes_and_reads_a_small_frame() {
        let bytes = written_bytes(b"hello").await;
        assert_eq!(&bytes[..FRAME_HEADER_LEN], &[5, 0, 0, 0]);
        assert_eq!(&bytes[FRAME_HEADER_LEN..], b"hello");

        let mut framer = framer_over(bytes);
        let payload = framer.read_frame().await.unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(framer.sequence(), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_is_one_empty_frame() {
        let bytes = written_bytes(&[]).await;
        assert_eq!(bytes, [0, 0, 0, 0]);

        let mut framer = framer_over(bytes);
        assert_eq!(framer.read_frame().await.unwrap(), Vec::<u8>::new());
        assert_eq!(framer.sequence(), 1);
    }

    #[tokio::test]
    async fn test_max_size_payload_gets_an_empty_terminator() {
        let payload = vec![0xAA; MAX_FRAME_PAYLOAD];
        let bytes = written_bytes(&payload).await;
        assert_eq!(
            frame_lengths(&bytes),
            vec![(MAX_FRAME_PAYLOAD, 0), (0, 1)]
        );

        // Reading back consumes the terminator and yields the exact payload.
        let mut framer = framer_over(bytes);
        assert_eq!(framer.read_frame().await.unwrap(), payload);
        assert_eq!(framer.sequence(), 2);
    }

    #[tokio::test]
    async fn test_double_max_payload_gets_an_empty_terminator() {
        let payload = vec![0xAA; 2 * MAX_FRAME_PAYLOAD];
        let bytes = written_bytes(&payload).await;
        assert_eq!(
            frame_lengths(&bytes),
            vec![(MAX_FRAME_PAYLOAD, 0), (MAX_FRAME_PAYLOAD, 1), (0, 2)]
        );

        let mut framer = framer_over(bytes);
        assert_eq!(framer.read_frame().await.unwrap(), payload);
        assert_eq!(framer.sequence(), 3);
    }

    #[tokio::test]
    async fn test_oversize_payload_ends_with_the_remainder() {
        let bytes = written_bytes(&vec![0xAA; 2 * MAX_FRAME_PAYLOAD + 1]).await;
        assert_eq!(
            frame_lengths(&bytes),
            vec![(MAX_FRAME_PAYLOAD, 0), (MAX_FRAME_PAYLOAD, 1), (1, 2)]
        );
    }

    #[tokio::test]
    async fn test_reassembles_split_frames() {
        let payload = vec![0x5C; 2 * MAX_FRAME_PAYLOAD + 1];
        let bytes = written_bytes(&payload).await;

        let mut framer = framer_over(bytes);
        let read = framer.read_frame().await.unwrap();
        assert_eq!(read.len(), payload.len());
        assert_eq!(read, payload);
        assert_eq!(framer.sequence(), 3);
    }

    #[tokio::test]
    async fn test_rejects_wrong_sequence_without_advancing() {
        let mut bytes = vec![1, 0, 0, 5]; // sequence 5, expected 0
        bytes.push(b'x');

        let mut framer = framer_over(bytes);
        let err = framer.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::Violation(_)));
        assert_eq!(framer.sequence(), 0);
    }

    #[tokio::test]
    async fn test_truncated_header_is_a_bad_connection() {
        let mut framer = framer_over(vec![5, 0]);
        let err = framer.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadConnection(_)));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_a_bad_connection() {
        let mut framer = framer_over(vec![5, 0, 0, 0, b'h', b'i']);
        let err = framer.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadConnection(_)));
    }

    #[tokio::test]
    async fn test_sequence_wraps_after_255() {
        let mut framer = framer_over(Vec::new());
        for _ in 0..256 {
            framer.write_frame(b"x").await.unwrap();
        }
        assert_eq!(framer.sequence(), 0);
    }

    #[tokio::test]
    async fn test_reset_returns_the_counter_to_zero() {
        let mut framer = framer_over(Vec::new());
        framer.write_frame(b"x").await.unwrap();
        assert_eq!(framer.sequence(), 1);
        framer.reset_sequence();
        assert_eq!(framer.sequence(), 0);
    }

    #[tokio::test]
    async fn test_frames_a_coded_ok_packet() {
        let coder = PacketCoder::new(CapabilityFlags::server_default());
        let bytes = written_bytes(&coder.encode_ok(5, 233, 234)).await;
        assert_eq!(bytes, [7, 0, 0, 0, 0, 233, 234, 5, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_frames_a_coded_err_packet() {
        let coder = PacketCoder::new(CapabilityFlags::server_default());
        let err = ProtocolError::Sql(SqlError::new(codes::ER_NO_TABLES_USED, "No tables used"));
        let bytes = written_bytes(&coder.encode_err(&err)).await;

        let mut expected = vec![23, 0, 0, 0, 0xFF, 0x48, 0x04, b'#'];
        expected.extend_from_slice(b"HY000");
        expected.extend_from_slice(b"No tables used");
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn test_frames_a_coded_eof_packet() {
        let coder = PacketCoder::new(CapabilityFlags::server_default());
        let bytes = written_bytes(&coder.encode_eof(123, 124)).await;
        assert_eq!(bytes, [5, 0, 0, 0, 0xFE, 123, 0, 124, 0]);
    }
}
