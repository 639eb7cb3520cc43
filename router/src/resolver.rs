use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver};

use crate::route::Route;

/// Dispatches each query to the first route whose predicate matches (§4.3).
///
/// Routing decisions depend only on the query, the client info and the
/// current wall-clock; the router itself holds no lock and caches nothing
/// (§4.3 "Determinism", §5 "The router holds no lock").
#[derive(Debug)]
pub struct RouterResolver {
    id: String,
    routes: Vec<Route>,
}

impl RouterResolver {
    pub fn new(id: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            id: id.into(),
            routes,
        }
    }
}

#[async_trait]
impl Resolver for RouterResolver {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        for route in &self.routes {
            if route.predicate.matches(query, client) {
                tracing::trace!(router = %self.id, route = %route.id, "matched route");
                return route.target.resolve(query, client).await;
            }
        }

        tracing::debug!(router = %self.id, "no route matched");
        Err(ResolveError::NoRoute)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    #[tokio::test]
    async fn first_matching_route_wins() {
        let blocked = StubResolver::new(
            "blocked",
            routedns_core::message::templated_response(
                &fixed_query("facebook.com.", RecordType::A),
                hickory_proto::op::ResponseCode::NXDomain,
            ),
        );
        let upstream = StubResolver::new(
            "upstream",
            routedns_core::testing::fixed_a_response(
                &fixed_query("facebook.com.", RecordType::A),
                "1.2.3.4".parse().unwrap(),
                60,
            ),
        );

        let mut restricted = Predicate::default();
        restricted.source_networks =
            Some(vec![ip_network::IpNetwork::V4("192.168.1.123/32".parse().unwrap())]);

        let router = RouterResolver::new(
            "router1",
            vec![
                Route::new("blocklisted", restricted, blocked.clone()),
                Route::default_route("default", upstream.clone()),
            ],
        );

        let query = fixed_query("facebook.com.", RecordType::A);
        let matching_client = fixed_client_info();
        let response = router.resolve(&query, &matching_client).await.unwrap().unwrap();
        assert_eq!(response.rcode(), hickory_proto::op::ResponseCode::NXDomain);

        let mut other_client = fixed_client_info();
        other_client.source_ip = "192.168.1.124".parse().unwrap();
        let response = router.resolve(&query, &other_client).await.unwrap().unwrap();
        assert_eq!(response.rcode(), hickory_proto::op::ResponseCode::NoError);
    }

    #[tokio::test]
    async fn no_default_route_fails_with_no_route() {
        let router = RouterResolver::new("router1", vec![]);
        let query = fixed_query("example.com.", RecordType::A);
        let err = router.resolve(&query, &fixed_client_info()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRoute));
    }
}
