use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Forwards unchanged, then clamps every record's TTL to `[min, max]` on the
/// way back (§4.5 "TTL clamp").
#[derive(Debug)]
pub struct TtlClamp {
    id: String,
    inner: ResolverHandle,
    min: Option<u32>,
    max: Option<u32>,
}

impl TtlClamp {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, min: Option<u32>, max: Option<u32>) -> Self {
        Self {
            id: id.into(),
            inner,
            min,
            max,
        }
    }
}

#[async_trait]
impl Resolver for TtlClamp {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(mut response) = self.inner.resolve(query, client).await? else {
            return Ok(None);
        };
        response.apply_ttl_bounds(self.min, self.max);
        Ok(Some(response))
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
    async fn clamps_ttl_into_bounds() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 5);
        let inner = StubResolver::new("inner", response);
        let modifier = TtlClamp::new("clamp", inner as ResolverHandle, Some(60), Some(3600));

        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(result.answers()[0].ttl(), 60);
    }

    #[tokio::test]
    async fn passes_through_drop_sentinel() {
        let query = fixed_query("example.com.", RecordType::A);
        let inner = routedns_core::testing::FailingResolver::new("inner", ResolveError::Timeout);
        let modifier = TtlClamp::new("clamp", inner as ResolverHandle, Some(60), None);
        assert!(modifier.resolve(&query, &fixed_client_info()).await.is_err());
    }
}
