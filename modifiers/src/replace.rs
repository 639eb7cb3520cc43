use async_trait::async_trait;
use hickory_proto::rr::Name;
use regex::Regex;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

struct Rewrite {
    pattern: Regex,
    replacement: String,
}

/// Rewrites the query name with an ordered list of regex substitutions
/// before forwarding, then restores the original name everywhere it
/// appears in the response (§4.5 "Replace").
pub struct Replace {
    id: String,
    inner: ResolverHandle,
    rules: Vec<Rewrite>,
}

impl std::fmt::Debug for Replace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replace").field("id", &self.id).field("inner", &self.inner.id()).finish()
    }
}

impl Replace {
    pub fn new(id: impl Into<String>, inner: ResolverHandle) -> Self {
        Self {
            id: id.into(),
            inner,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        self.rules.push(Rewrite {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        });
        Ok(self)
    }

    fn rewrite(&self, name: &str) -> String {
        let mut out = name.to_string();
        for rule in &self.rules {
            out = rule.pattern.replace_all(&out, rule.replacement.as_str()).into_owned();
        }
        out
    }
}

#[async_trait]
impl Resolver for Replace {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(question) = query.question() else {
            return self.inner.resolve(query, client).await;
        };
        let original = question.name().to_ascii();
        let rewritten = self.rewrite(&original);
        if rewritten == original {
            return self.inner.resolve(query, client).await;
        }

        let rewritten_name = Name::from_ascii(&rewritten).map_err(|_| ResolveError::Malformed)?;
        let original_name = Name::from_ascii(&original).map_err(|_| ResolveError::Malformed)?;

        let mut outbound = query.clone();
        if let Some(q) = outbound.question_mut() {
            q.set_name(rewritten_name.clone());
        }

        let Some(mut response) = self.inner.resolve(&outbound, client).await? else {
            return Ok(None);
        };

        if let Some(q) = response.question_mut() {
            if q.name() == &rewritten_name {
                q.set_name(original_name.clone());
            }
        }
        for record in response
            .answers_mut()
            .iter_mut()
            .chain(response.authority_mut())
            .chain(response.additionals_mut())
        {
            if record.name() == &rewritten_name {
                record.set_name(original_name.clone());
            }
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
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    #[tokio::test]
    async fn rewrites_forward_and_restores_backward() {
        let rewritten_query = fixed_query("internal.corp.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&rewritten_query, "10.0.0.5".parse().unwrap(), 60);
        let inner = StubResolver::new("inner", response);

        let modifier = Replace::new("rewrite", inner.clone() as ResolverHandle)
            .with_rule(r"\.public\.example\.$", ".internal.corp.")
            .unwrap();

        let query = fixed_query("host.public.example.", RecordType::A);
        let result = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();

        assert_eq!(
            result.answers()[0].name().to_ascii(),
            "host.public.example."
        );
    }

    #[tokio::test]
    async fn no_match_passes_through_unmodified() {
        let response = fixed_query("example.com.", RecordType::A);
        let inner = StubResolver::new("inner", response);
        let modifier = Replace::new("rewrite", inner.clone() as ResolverHandle)
            .with_rule(r"^nomatch\.$", "other.")
            .unwrap();

        let query = fixed_query("example.com.", RecordType::A);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }
}
