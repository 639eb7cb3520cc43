use async_trait::async_trait;
use routedns_core::message::templated_response;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver};

/// Always answers with the TC bit set and no records, prompting the client
/// to retry over TCP (§4.5 "Truncate").
#[derive(Debug)]
pub struct Truncate {
    id: String,
}

impl Truncate {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Resolver for Truncate {
    async fn resolve(
        &self,
        query: &DnsMessage,
        _client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let mut response = templated_response(query, hickory_proto::op::ResponseCode::NoError);
        response.set_truncated(true);
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
    use routedns_core::testing::{fixed_client_info, fixed_query};

    #[tokio::test]
    async fn sets_the_truncated_bit() {
        let modifier = Truncate::new("truncate");
        let query = fixed_query("example.com.", RecordType::A);
        let response = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert!(response.truncated());
    }
}
