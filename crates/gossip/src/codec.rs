//! JSON framing over a TCP stream.
//!
//! A frame is the whole byte stream in one direction: the writer sends one
//! JSON document and shuts down its write half, the reader reads to EOF.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GossipError, Result};

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    writer.write_all(&bytes).await?;
    writer.shutdown().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R, max_bytes: usize) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut buffer = Vec::new();
    reader
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut buffer)
        .await?;
    if buffer.len() > max_bytes {
        return Err(GossipError::FrameTooLarge {
            len: buffer.len(),
            max: max_bytes,
        });
    }
    Ok(serde_json::from_slice(&buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Response;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &Response::ok("hi")).await.unwrap();
        let response: Response = read_frame(&mut server, 1024).await.unwrap();
        assert_eq!(response, Response::ok("hi"));
    }

    #[tokio::test]
    async fn test_oversized_frame() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &Response::ok("x".repeat(100))).await.unwrap();
        let result: Result<Response> = read_frame(&mut server, 16).await;
        assert!(matches!(result, Err(GossipError::FrameTooLarge { max: 16, .. })));
    }

    #[tokio::test]
    async fn test_malformed_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"{not json").await.unwrap();
        client.shutdown().await.unwrap();
        let result: Result<Response> = read_frame(&mut server, 64).await;
        assert!(matches!(result, Err(GossipError::Codec(_))));
    }
}
