use routedns_core::DnsMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ListenerError;

/// RFC 1035 §4.2.2 2-byte big-endian length-prefixed framing, shared by the
/// TCP and DoT listeners. Deliberately duplicated from `routedns-upstream`'s
/// identical `framed` module rather than taken as a dependency: listeners
/// serve queries, upstream dials them, and the two crates have no other
/// reason to depend on each other.
pub async fn write_framed<W: AsyncWrite + Unpin>(writer: &mut W, message: &DnsMessage) -> Result<(), ListenerError> {
    let bytes = message.to_wire().map_err(ListenerError::Encode)?;
    if bytes.len() > u16::MAX as usize {
        return Err(ListenerError::MessageTooLarge(bytes.len()));
    }
    writer.write_all(&(bytes.len() as u16).to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await.map_err(ListenerError::from)
}

/// Reads one length-prefixed message. `Ok(None)` on a clean EOF before any
/// bytes of the next message arrive (a client closing an idle connection).
pub async fn read_framed<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, ListenerError> {
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ListenerError::from(e)),
    }
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
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
        assert_eq!(DnsMessage::from_wire(&read).unwrap(), message);
    }

    #[tokio::test]
    async fn clean_eof_before_a_frame_is_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_framed(&mut server).await.unwrap().is_none());
    }
}
