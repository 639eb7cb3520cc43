use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Retries against `retry` (typically a TCP or TLS path) whenever `inner`
/// returns a truncated response (§4.5 "Truncate-retry").
#[derive(Debug)]
pub struct TruncateRetry {
    id: String,
    inner: ResolverHandle,
    retry: ResolverHandle,
}

impl TruncateRetry {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, retry: ResolverHandle) -> Self {
        Self {
            id: id.into(),
            inner,
            retry,
        }
    }
}

#[async_trait]
impl Resolver for TruncateRetry {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        match self.inner.resolve(query, client).await? {
            Some(response) if response.truncated() => self.retry.resolve(query, client).await,
            other => Ok(other),
        }
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
    async fn retries_on_truncation() {
        let query = fixed_query("example.com.", RecordType::A);
        let mut truncated = fixed_query("example.com.", RecordType::A);
        truncated.set_truncated(true);
        let udp = StubResolver::new("udp", truncated);
        let tcp_response = routedns_core::testing::fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 60);
        let tcp = StubResolver::new("tcp", tcp_response);

        let modifier = TruncateRetry::new("retry", udp.clone() as ResolverHandle, tcp.clone() as ResolverHandle);
        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();

        assert_eq!(udp.call_count(), 1);
        assert_eq!(tcp.call_count(), 1);
        assert!(!result.truncated());
    }

    #[tokio::test]
    async fn does_not_retry_when_not_truncated() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 60);
        let udp = StubResolver::new("udp", response);
        let tcp = StubResolver::new("tcp", fixed_query("example.com.", RecordType::A));

        let modifier = TruncateRetry::new("retry", udp.clone() as ResolverHandle, tcp.clone() as ResolverHandle);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();

        assert_eq!(udp.call_count(), 1);
        assert_eq!(tcp.call_count(), 0);
    }
}
