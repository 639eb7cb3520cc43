//! Cache snapshot persistence (§6 "Persisted state layout").
//!
//! A length-prefixed sequence of bincode-encoded [`PersistedEntry`] records.
//! Unknown/future fields are tolerated by bincode's forward-append-only
//! convention (new optional fields must be added at the end); entries whose
//! expiry is already past are dropped silently on load.

use std::io::SeekFrom;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use routedns_core::DnsMessage;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    query: DnsMessage,
    response: DnsMessage,
    #[serde(with = "crate::entry::system_time_as_secs")]
    inserted_at: SystemTime,
    #[serde(with = "crate::entry::system_time_as_secs")]
    expires_at: SystemTime,
}

pub async fn save(path: &Path, entries: Vec<(DnsMessage, crate::entry::CacheEntry)>) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    for (query, entry) in entries {
        let persisted = PersistedEntry {
            query,
            response: entry.response,
            inserted_at: entry.inserted_at,
            expires_at: entry.expires_at,
        };
        let bytes = bincode::serialize(&persisted).map_err(std::io::Error::other)?;
        file.write_u32_le(bytes.len() as u32).await?;
        file.write_all(&bytes).await?;
    }
    file.flush().await?;
    Ok(())
}

pub async fn load(path: &Path) -> std::io::Result<Vec<(DnsMessage, crate::entry::CacheEntry)>> {
    let mut file = File::open(path).await?;
    let len = file.seek(SeekFrom::End(0)).await?;
    file.seek(SeekFrom::Start(0)).await?;

    let mut out = Vec::new();
    let mut pos = 0u64;
    let now = SystemTime::now();

    while pos < len {
        let record_len = match file.read_u32_le().await {
            Ok(n) => n,
            Err(_) => break,
        };
        let mut buf = vec![0u8; record_len as usize];
        file.read_exact(&mut buf).await?;
        pos += 4 + record_len as u64;

        let persisted: PersistedEntry = match bincode::deserialize(&buf) {
            Ok(p) => p,
            Err(_) => continue,
        };

        if persisted.expires_at <= now {
            continue;
        }

        out.push((
            persisted.query,
            crate::entry::CacheEntry {
                response: persisted.response,
                inserted_at: persisted.inserted_at,
                expires_at: persisted.expires_at,
            },
        ));
    }

    Ok(out)
}
