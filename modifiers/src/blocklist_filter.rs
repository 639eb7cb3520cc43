use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RecordType, RData};
use routedns_blocklist::{Database, MatchResult};
use routedns_core::message::{spoofed_address_response, templated_response};
use routedns_core::{attach_extended_error, ClientInfo, DnsMessage, ExtendedErrorCode, ResolveError, Resolver, ResolverHandle};

/// What happens on a blocklist hit (§4.5 "Blocklist/Allowlist").
#[derive(Debug, Clone)]
pub enum BlockAction {
    Nxdomain,
    /// Forward to an alternate resolver instead of answering locally.
    Divert(ResolverHandle),
}

/// Tests the question against an allowlist (bypass) and a blocklist before
/// forwarding; a blocklist hit is answered with NXDOMAIN, a spoofed A/AAAA or
/// PTR name the database supplies, or diverted to an alternate resolver.
#[derive(Debug)]
pub struct BlocklistFilter {
    id: String,
    inner: ResolverHandle,
    allowlist: Option<Arc<dyn Database>>,
    blocklist: Arc<dyn Database>,
    action: BlockAction,
    ede: Option<&'static str>,
}

impl BlocklistFilter {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, blocklist: Arc<dyn Database>, action: BlockAction) -> Self {
        Self {
            id: id.into(),
            inner,
            allowlist: None,
            blocklist,
            action,
            ede: None,
        }
    }

    pub fn with_allowlist(mut self, allowlist: Arc<dyn Database>) -> Self {
        self.allowlist = Some(allowlist);
        self
    }

    /// Attaches a fixed Extended DNS Error text to any locally-built block
    /// response (§4.5 "An optional EDE template injects an Extended DNS
    /// Error").
    pub fn with_ede(mut self, text: &'static str) -> Self {
        self.ede = Some(text);
        self
    }

    fn with_optional_ede(&self, mut response: DnsMessage) -> DnsMessage {
        if let Some(text) = self.ede {
            attach_extended_error(&mut response, ExtendedErrorCode::Blocked, Some(text));
        }
        response
    }

    fn ptr_name_response(&self, query: &DnsMessage, hit: &MatchResult) -> Option<DnsMessage> {
        let name = hit.name_overrides.first()?;
        let mut response = templated_response(query, ResponseCode::NoError);
        let question_name = query.question()?.name().clone();
        let target = hickory_proto::rr::Name::from_ascii(name).ok()?;
        let record = hickory_proto::rr::Record::from_rdata(question_name, 60, RData::PTR(target));
        response.answers_mut().push(record);
        Some(response)
    }
}

#[async_trait]
impl Resolver for BlocklistFilter {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(question) = query.question() else {
            return self.inner.resolve(query, client).await;
        };
        let name = question.name().to_ascii();

        if let Some(allowlist) = &self.allowlist {
            if allowlist.match_name(&name).is_some() {
                return self.inner.resolve(query, client).await;
            }
        }

        let Some(hit) = self.blocklist.match_name(&name) else {
            return self.inner.resolve(query, client).await;
        };

        if question.query_type() == RecordType::PTR {
            if let Some(response) = self.ptr_name_response(query, &hit) {
                return Ok(Some(self.with_optional_ede(response)));
            }
        }

        let wanted_family_ip = hit.ip_overrides.iter().find(|ip| match question.query_type() {
            RecordType::A => ip.is_ipv4(),
            RecordType::AAAA => ip.is_ipv6(),
            _ => false,
        });
        if let Some(ip) = wanted_family_ip {
            let response = spoofed_address_response(query, question.name(), *ip, 60);
            return Ok(Some(self.with_optional_ede(response)));
        }

        match &self.action {
            BlockAction::Nxdomain => {
                let response = templated_response(query, ResponseCode::NXDomain);
                Ok(Some(self.with_optional_ede(response)))
            }
            BlockAction::Divert(alternate) => alternate.resolve(query, client).await,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType as RT;
    use routedns_blocklist::DomainTree;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    fn blocklist_with(pattern: &str) -> Arc<dyn Database> {
        let mut tree = DomainTree::new("test");
        tree.insert(pattern, "r1");
        Arc::new(tree)
    }

    #[tokio::test]
    async fn blocked_name_returns_nxdomain() {
        let inner = StubResolver::new("inner", fixed_query("ads.example.", RT::A));
        let filter = BlocklistFilter::new(
            "filter",
            inner.clone() as ResolverHandle,
            blocklist_with(".ads.example"),
            BlockAction::Nxdomain,
        );
        let query = fixed_query("ads.example.", RT::A);
        let response = filter.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(response.rcode(), ResponseCode::NXDomain);
        assert_eq!(inner.call_count(), 0);
    }

    #[tokio::test]
    async fn allowlist_bypasses_the_blocklist() {
        let inner = StubResolver::new("inner", fixed_query("ads.example.", RT::A));
        let filter = BlocklistFilter::new(
            "filter",
            inner.clone() as ResolverHandle,
            blocklist_with(".ads.example"),
            BlockAction::Nxdomain,
        )
        .with_allowlist(blocklist_with("ads.example"));
        let query = fixed_query("ads.example.", RT::A);
        filter.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn unmatched_name_forwards_to_inner() {
        let inner = StubResolver::new("inner", fixed_query("safe.example.", RT::A));
        let filter = BlocklistFilter::new(
            "filter",
            inner.clone() as ResolverHandle,
            blocklist_with(".ads.example"),
            BlockAction::Nxdomain,
        );
        let query = fixed_query("safe.example.", RT::A);
        filter.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn ede_is_attached_to_block_responses() {
        let inner = StubResolver::new("inner", fixed_query("ads.example.", RT::A));
        let filter = BlocklistFilter::new(
            "filter",
            inner as ResolverHandle,
            blocklist_with(".ads.example"),
            BlockAction::Nxdomain,
        )
        .with_ede("matched ads list");
        let query = fixed_query("ads.example.", RT::A);
        let response = filter.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        let (_, text) = routedns_core::read_extended_error(&response).unwrap();
        assert_eq!(text.as_deref(), Some("matched ads list"));
    }
}
