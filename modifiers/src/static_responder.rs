use std::net::IpAddr;

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use routedns_core::message::{spoofed_address_response, templated_response};
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver};

/// What a [`StaticResponder`] answers with, built without contacting any
/// upstream (§4.5 "Static responder").
#[derive(Debug, Clone)]
pub enum Template {
    Rcode(ResponseCode),
    Address { ip: IpAddr, ttl: u32 },
}

#[derive(Debug)]
pub struct StaticResponder {
    id: String,
    template: Template,
}

impl StaticResponder {
    pub fn new(id: impl Into<String>, template: Template) -> Self {
        Self {
            id: id.into(),
            template,
        }
    }
}

#[async_trait]
impl Resolver for StaticResponder {
    async fn resolve(
        &self,
        query: &DnsMessage,
        _client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let response = match &self.template {
            Template::Rcode(rcode) => templated_response(query, *rcode),
            Template::Address { ip, ttl } => {
                let Some(name) = query.question().map(|q| q.name().clone()) else {
                    return Ok(Some(templated_response(query, ResponseCode::FormErr)));
                };
                spoofed_address_response(query, &name, *ip, *ttl)
            }
        };
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
    async fn rcode_template_carries_the_question_forward() {
        let responder = StaticResponder::new("static", Template::Rcode(ResponseCode::Refused));
        let query = fixed_query("blocked.example.", RecordType::A);
        let response = responder.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(response.rcode(), ResponseCode::Refused);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn address_template_builds_a_single_answer() {
        let responder = StaticResponder::new(
            "static",
            Template::Address {
                ip: "10.0.0.1".parse().unwrap(),
                ttl: 30,
            },
        );
        let query = fixed_query("sinkhole.example.", RecordType::A);
        let response = responder.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(response.answers().len(), 1);
        assert_eq!(response.answers()[0].ttl(), 30);
    }
}
