use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver};

/// Always answers with the "no response" sentinel, instructing the listener
/// to close the connection without replying (§4.5 "Drop").
#[derive(Debug)]
pub struct DropModifier {
    id: String,
}

impl DropModifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Resolver for DropModifier {
    async fn resolve(
        &self,
        _query: &DnsMessage,
        _client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        Ok(None)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query};

    #[tokio::test]
    async fn always_returns_none() {
        let modifier = DropModifier::new("drop");
        let query = fixed_query("example.com.", RecordType::A);
        assert!(modifier.resolve(&query, &fixed_client_info()).await.unwrap().is_none());
    }
}
