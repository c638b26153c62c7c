//! Wire format
//!
//! Every frame is `[tag: u8][part_count: u32 BE]` followed by `part_count`
//! parts, each `[len: u32 BE][bytes]`.
//!
//! | tag | frame     | parts                              |
//! |-----|-----------|------------------------------------|
//! | 1   | SUBSCRIBE | topic keys                         |
//! | 2   | ACK       | acknowledged topic keys            |
//! | 3   | MESSAGE   | routing key (topic), payload (text) |

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BusError, Result};

pub const TAG_SUBSCRIBE: u8 = 1;
pub const TAG_ACK: u8 = 2;
pub const TAG_MESSAGE: u8 = 3;

/// Maximum size of one frame part (16 MiB)
pub const MAX_PART_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of parts in one frame
pub const MAX_PARTS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Subscribe(Vec<String>),
    Ack(Vec<String>),
    Message { key: String, payload: Bytes },
}

impl Frame {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Subscribe(_) => TAG_SUBSCRIBE,
            Self::Ack(_) => TAG_ACK,
            Self::Message { .. } => TAG_MESSAGE,
        }
    }

    /// Encode the frame into a single buffer
    ///
    /// # Errors
    ///
    /// Returns `BusError::FrameTooLarge` if a part exceeds `MAX_PART_SIZE`.
    pub fn encode(&self) -> Result<Bytes> {
        let parts: Vec<&[u8]> = match self {
            Self::Subscribe(keys) | Self::Ack(keys) => keys.iter().map(|k| k.as_bytes()).collect(),
            Self::Message { key, payload } => vec![key.as_bytes(), payload.as_ref()],
        };

        if parts.len() > MAX_PARTS {
            return Err(BusError::malformed(format!("{} parts exceed the limit", parts.len())));
        }

        let body: usize = parts.iter().map(|p| 4 + p.len()).sum();
        let mut buf = BytesMut::with_capacity(5 + body);
        buf.put_u8(self.tag());
        buf.put_u32(parts.len() as u32);

        for part in parts {
            if part.len() > MAX_PART_SIZE {
                return Err(BusError::FrameTooLarge {
                    size: part.len(),
                    max: MAX_PART_SIZE,
                });
            }
            buf.put_u32(part.len() as u32);
            buf.put_slice(part);
        }

        Ok(buf.freeze())
    }

    fn from_parts(tag: u8, parts: Vec<Bytes>) -> Result<Self> {
        match tag {
            TAG_SUBSCRIBE => Ok(Self::Subscribe(keys(parts)?)),
            TAG_ACK => Ok(Self::Ack(keys(parts)?)),
            TAG_MESSAGE => {
                let [key, payload]: [Bytes; 2] = parts.try_into().map_err(|parts: Vec<Bytes>| {
                    BusError::malformed(format!("message has {} parts, expected 2", parts.len()))
                })?;
                Ok(Self::Message {
                    key: utf8(key)?,
                    payload,
                })
            }
            other => Err(BusError::malformed(format!("unknown tag {}", other))),
        }
    }
}

fn utf8(part: Bytes) -> Result<String> {
    String::from_utf8(part.to_vec()).map_err(|_| BusError::malformed("topic key is not UTF-8"))
}

fn keys(parts: Vec<Bytes>) -> Result<Vec<String>> {
    parts.into_iter().map(utf8).collect()
}

/// Read one frame
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before the
/// first byte of a frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let tag = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let count = reader.read_u32().await? as usize;
    if count > MAX_PARTS {
        return Err(BusError::malformed(format!("{} parts exceed the limit", count)));
    }

    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u32().await? as usize;
        if len > MAX_PART_SIZE {
            return Err(BusError::FrameTooLarge {
                size: len,
                max: MAX_PART_SIZE,
            });
        }
        let mut part = BytesMut::zeroed(len);
        reader.read_exact(&mut part).await?;
        parts.push(part.freeze());
    }

    Frame::from_parts(tag, parts).map(Some)
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_layout() {
        let frame = Frame::Message {
            key: "Sport".to_string(),
            payload: Bytes::from_static(b"# Sport\n"),
        };
        let bytes = frame.encode().unwrap();

        let mut expected = vec![3, 0, 0, 0, 2, 0, 0, 0, 5];
        expected.extend_from_slice(b"Sport");
        expected.extend_from_slice(&[0, 0, 0, 8]);
        expected.extend_from_slice(b"# Sport\n");
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_read_back_subscribe() {
        let frame = Frame::Subscribe(vec!["Sport".to_string(), "Music".to_string()]);
        let bytes = frame.encode().unwrap();

        let mut reader = bytes.as_ref();
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(frame));
        // stream exhausted at a frame boundary
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_malformed() {
        let mut reader: &[u8] = &[9, 0, 0, 0, 0];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, BusError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_message_needs_two_parts() {
        let bytes = Frame::Ack(vec!["only-one".to_string()]).encode().unwrap();
        let mut tampered = bytes.to_vec();
        tampered[0] = TAG_MESSAGE;

        let mut reader = tampered.as_slice();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, BusError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_oversized_part_is_rejected_before_reading() {
        let mut header = vec![TAG_MESSAGE, 0, 0, 0, 2];
        header.extend_from_slice(&((MAX_PART_SIZE as u32) + 1).to_be_bytes());

        let mut reader = header.as_slice();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, BusError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let bytes = Frame::Subscribe(vec!["Sport".to_string()]).encode().unwrap();
        let mut reader = &bytes[..bytes.len() - 2];

        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, BusError::Io(_)));
    }
}
