use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RData;
use routedns_blocklist::Database;
use routedns_core::message::templated_response;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// What happens when a response record matches the blocklist (§4.5
/// "Response-IP and response-name blocklists").
#[derive(Debug, Clone)]
pub enum ResponseBlockAction {
    /// Drop only the matching records.
    Filter,
    Nxdomain,
    Divert(ResolverHandle),
}

fn name_target(rdata: &RData) -> Option<String> {
    match rdata {
        RData::CNAME(n) | RData::NS(n) | RData::PTR(n) => Some(n.to_ascii()),
        RData::MX(mx) => Some(mx.exchange().to_ascii()),
        RData::SRV(srv) => Some(srv.target().to_ascii()),
        _ => None,
    }
}

fn ip_target(rdata: &RData) -> Option<std::net::IpAddr> {
    match rdata {
        RData::A(a) => Some(std::net::IpAddr::V4(a.0)),
        RData::AAAA(aaaa) => Some(std::net::IpAddr::V6(aaaa.0)),
        _ => None,
    }
}

/// Scans every record in the answer, authority and additional sections of
/// the inner resolver's response against an IP blocklist (A/AAAA) and a name
/// blocklist (CNAME/MX/NS/PTR/SRV targets).
#[derive(Debug)]
pub struct ResponseBlocklist {
    id: String,
    inner: ResolverHandle,
    ip_blocklist: Option<Arc<dyn Database>>,
    name_blocklist: Option<Arc<dyn Database>>,
    action: ResponseBlockAction,
}

impl ResponseBlocklist {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, action: ResponseBlockAction) -> Self {
        Self {
            id: id.into(),
            inner,
            ip_blocklist: None,
            name_blocklist: None,
            action,
        }
    }

    pub fn with_ip_blocklist(mut self, db: Arc<dyn Database>) -> Self {
        self.ip_blocklist = Some(db);
        self
    }

    pub fn with_name_blocklist(mut self, db: Arc<dyn Database>) -> Self {
        self.name_blocklist = Some(db);
        self
    }

    fn record_matches(&self, rdata: &RData) -> bool {
        if let (Some(db), Some(ip)) = (&self.ip_blocklist, ip_target(rdata)) {
            if db.match_addr(ip).is_some() {
                return true;
            }
        }
        if let (Some(db), Some(name)) = (&self.name_blocklist, name_target(rdata)) {
            if db.match_name(&name).is_some() {
                return true;
            }
        }
        false
    }

    fn any_match(&self, response: &DnsMessage) -> bool {
        response.all_records().any(|r| self.record_matches(r.data()))
    }
}

#[async_trait]
impl Resolver for ResponseBlocklist {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(mut response) = self.inner.resolve(query, client).await? else {
            return Ok(None);
        };

        if !self.any_match(&response) {
            return Ok(Some(response));
        }

        match &self.action {
            ResponseBlockAction::Filter => {
                response.retain_answers(|record| !self.record_matches(record.data()));
                Ok(Some(response))
            }
            ResponseBlockAction::Nxdomain => Ok(Some(templated_response(query, ResponseCode::NXDomain))),
            ResponseBlockAction::Divert(alternate) => alternate.resolve(query, client).await,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType};
    use hickory_proto::rr::{Record, RecordType};
    use routedns_blocklist::CidrSet;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    fn response_with_ip(query: &DnsMessage, ip: &str) -> DnsMessage {
        let mut msg = Message::new();
        msg.set_id(query.id());
        msg.set_message_type(MessageType::Response);
        msg.add_query(query.question().unwrap().clone());
        msg.add_answer(Record::from_rdata(
            query.question().unwrap().name().clone(),
            60,
            RData::A(ip.parse().unwrap()),
        ));
        DnsMessage::from_inner(msg)
    }

    #[tokio::test]
    async fn filters_matching_answer_ip() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = response_with_ip(&query, "10.10.10.10");
        let inner = StubResolver::new("inner", response);

        let mut set = CidrSet::new("test");
        set.insert(ip_network::IpNetwork::V4("10.10.10.0/24".parse().unwrap()), "r1");

        let modifier = ResponseBlocklist::new("resp-block", inner as ResolverHandle, ResponseBlockAction::Filter)
            .with_ip_blocklist(Arc::new(set));

        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert!(result.answers().is_empty());
    }

    #[tokio::test]
    async fn unmatched_response_passes_through() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = response_with_ip(&query, "1.2.3.4");
        let inner = StubResolver::new("inner", response);

        let mut set = CidrSet::new("test");
        set.insert(ip_network::IpNetwork::V4("10.10.10.0/24".parse().unwrap()), "r1");

        let modifier = ResponseBlocklist::new("resp-block", inner as ResolverHandle, ResponseBlockAction::Filter)
            .with_ip_blocklist(Arc::new(set));

        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(result.answers().len(), 1);
    }
}
