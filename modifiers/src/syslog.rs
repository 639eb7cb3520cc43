use async_trait::async_trait;
use serde_json::json;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Output encoding for [`Syslog`] records (§4.5 "emit structured records
/// (text or JSON)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Text,
    Json,
}

/// Non-modifying observer that forwards the query unchanged and emits one
/// structured record per query via `tracing`, in the configured format.
///
/// Despite the name, this does not open a syslog socket itself; it relies on
/// the binary's `tracing-subscriber` layer to ship records to whatever sink
/// (including an actual syslog daemon) the deployment configures.
#[derive(Debug)]
pub struct Syslog {
    id: String,
    inner: ResolverHandle,
    format: RecordFormat,
}

impl Syslog {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, format: RecordFormat) -> Self {
        Self {
            id: id.into(),
            inner,
            format,
        }
    }
}

#[async_trait]
impl Resolver for Syslog {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let result = self.inner.resolve(query, client).await;

        let name = query.question().map(|q| q.name().to_ascii()).unwrap_or_default();
        let qtype = query.question().map(|q| q.query_type());
        let rcode = result.as_ref().ok().and_then(|r| r.as_ref()).map(|r| r.rcode());

        match self.format {
            RecordFormat::Json => {
                let record = json!({
                    "client": client.source_ip.to_string(),
                    "name": name,
                    "qtype": qtype.map(|t| t.to_string()),
                    "rcode": rcode.map(|c| c.to_string()),
                });
                tracing::info!(target: "routedns::syslog", record = %record, "dns query");
            }
            RecordFormat::Text => {
                tracing::info!(
                    target: "routedns::syslog",
                    "{} {} {:?} {:?}",
                    client.source_ip,
                    name,
                    qtype,
                    rcode,
                );
            }
        }

        result
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    #[tokio::test]
    async fn forwards_the_query_unchanged() {
        let response = fixed_query("example.com.", RecordType::A);
        let inner = StubResolver::new("inner", response);
        let modifier = Syslog::new("syslog", inner.clone() as ResolverHandle, RecordFormat::Json);

        let query = fixed_query("example.com.", RecordType::A);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }
}
