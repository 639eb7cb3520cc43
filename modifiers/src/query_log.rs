use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Whether the query log records the response alongside the query (§4.5
/// "optionally... response").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogVerbosity {
    QueryOnly,
    QueryAndResponse,
}

/// Emits a structured `tracing` event per query and forwards it unchanged
/// (§4.5 "Query log and syslog").
#[derive(Debug)]
pub struct QueryLog {
    id: String,
    inner: ResolverHandle,
    verbosity: LogVerbosity,
}

impl QueryLog {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, verbosity: LogVerbosity) -> Self {
        Self {
            id: id.into(),
            inner,
            verbosity,
        }
    }
}

#[async_trait]
impl Resolver for QueryLog {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let name = query.question().map(|q| q.name().to_ascii()).unwrap_or_default();
        let qtype = query.question().map(|q| q.query_type());

        let result = self.inner.resolve(query, client).await;

        match (&result, self.verbosity) {
            (Ok(Some(response)), LogVerbosity::QueryAndResponse) => {
                tracing::info!(
                    target: "routedns::query_log",
                    client = %client.source_ip,
                    name,
                    ?qtype,
                    rcode = ?response.rcode(),
                    answers = response.answers().len(),
                    "query resolved",
                );
            }
            (Ok(None), LogVerbosity::QueryAndResponse) => {
                tracing::info!(
                    target: "routedns::query_log",
                    client = %client.source_ip,
                    name,
                    ?qtype,
                    "query dropped",
                );
            }
            (Err(err), _) => {
                tracing::info!(
                    target: "routedns::query_log",
                    client = %client.source_ip,
                    name,
                    ?qtype,
                    error = %err,
                    "query failed",
                );
            }
            (Ok(_), LogVerbosity::QueryOnly) => {
                tracing::info!(
                    target: "routedns::query_log",
                    client = %client.source_ip,
                    name,
                    ?qtype,
                    "query received",
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
        let modifier = QueryLog::new("log", inner.clone() as ResolverHandle, LogVerbosity::QueryAndResponse);

        let query = fixed_query("example.com.", RecordType::A);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }
}
