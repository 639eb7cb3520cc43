use routedns_core::DnsMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::UpstreamError;

/// Writes one message with the RFC 1035 §4.2.2 2-byte big-endian length
/// prefix used by TCP, DoT and (once the handshake establishes a reliable
/// byte stream) DTLS.
pub async fn write_framed<W: AsyncWrite + Unpin>(writer: &mut W, message: &DnsMessage) -> Result<(), UpstreamError> {
    let bytes = message.to_wire().map_err(UpstreamError::Encode)?;
    if bytes.len() > u16::MAX as usize {
        return Err(UpstreamError::MessageTooLarge(bytes.len()));
    }
    writer
        .write_all(&(bytes.len() as u16).to_be_bytes())
        .await
        .map_err(UpstreamError::Io)?;
    writer.write_all(&bytes).await.map_err(UpstreamError::Io)?;
    writer.flush().await.map_err(UpstreamError::Io)
}

/// Reads one length-prefixed message. Returns `Ok(None)` on a clean EOF
/// before any bytes of the next message arrive (§4.1 reader step 3: "On
/// timeout or EOF: closes the connection").
pub async fn read_framed<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<DnsMessage>, UpstreamError> {
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(UpstreamError::Io(e)),
    }
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(UpstreamError::Io)?;
    // A decode failure that still yields a readable frame (e.g. a
    // truncated-but-parseable message) is surfaced as the response per
    // §4.1's "Read decode errors that still produced a non-nil message are
    // surfaced as the response"; only a structurally unreadable frame fails.
    DnsMessage::from_wire(&buf).map(Some).map_err(|_| UpstreamError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;

    #[tokio::test]
    async fn round_trips_through_an_in_memory_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let message = routedns_core::testing::fixed_query("example.com.", RecordType::A);

        let written = message.clone();
        let writer = tokio::spawn(async move {
            write_framed(&mut client, &written).await.unwrap();
        });

        let read = read_framed(&mut server).await.unwrap().unwrap();
        writer.await.unwrap();
        assert_eq!(read, message);
    }

    #[tokio::test]
    async fn clean_eof_before_a_frame_is_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_framed(&mut server).await.unwrap().is_none());
    }
}
