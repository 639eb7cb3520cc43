use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Drops answer records whose type doesn't match the query type; if nothing
/// remains, rewrites the response to `empty_rcode` (§4.5 "Response collapse").
///
/// Leaves CNAME records in place regardless of the query type, since a CNAME
/// chain is how the queried type's answer is reached.
#[derive(Debug)]
pub struct Collapse {
    id: String,
    inner: ResolverHandle,
    empty_rcode: ResponseCode,
}

impl Collapse {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, empty_rcode: ResponseCode) -> Self {
        Self {
            id: id.into(),
            inner,
            empty_rcode,
        }
    }
}

#[async_trait]
impl Resolver for Collapse {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(mut response) = self.inner.resolve(query, client).await? else {
            return Ok(None);
        };
        let Some(wanted) = query.question().map(|q| q.query_type()) else {
            return Ok(Some(response));
        };

        response.retain_answers(|record| {
            record.record_type() == wanted || record.record_type() == hickory_proto::rr::RecordType::CNAME
        });

        if response.answers().is_empty() {
            response.set_rcode(self.empty_rcode);
        }

        Ok(Some(response))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType};
    use hickory_proto::rr::{RData, Record, RecordType};
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    fn response_with_mixed_types(query: &DnsMessage) -> DnsMessage {
        let mut msg = Message::new();
        msg.set_id(query.id());
        msg.set_message_type(MessageType::Response);
        let name = query.question().unwrap().name().clone();
        msg.add_query(query.question().unwrap().clone());
        msg.add_answer(Record::from_rdata(name.clone(), 60, RData::A("1.2.3.4".parse().unwrap())));
        msg.add_answer(Record::from_rdata(
            name,
            60,
            RData::TXT(hickory_proto::rr::rdata::TXT::new(vec!["unrelated".to_string()])),
        ));
        DnsMessage::from_inner(msg)
    }

    #[tokio::test]
    async fn drops_records_of_other_types() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = response_with_mixed_types(&query);
        let inner = StubResolver::new("inner", response);
        let modifier = Collapse::new("collapse", inner as ResolverHandle, ResponseCode::NXDomain);

        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(result.answers().len(), 1);
        assert_eq!(result.answers()[0].record_type(), RecordType::A);
    }

    #[tokio::test]
    async fn empty_result_gets_configured_rcode() {
        let query = fixed_query("example.com.", RecordType::AAAA);
        let response = response_with_mixed_types(&query);
        let inner = StubResolver::new("inner", response);
        let modifier = Collapse::new("collapse", inner as ResolverHandle, ResponseCode::NXDomain);

        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert!(result.answers().is_empty());
        assert_eq!(result.rcode(), ResponseCode::NXDomain);
    }
}
