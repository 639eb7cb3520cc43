use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use routedns_core::DnsMessage;

use crate::error::UpstreamError;

/// Expands an RFC 6570-style URL template's `dns` variable, shared between
/// the HTTP/2 (`DohClient`) and HTTP/3 (`Doh3Client`) request builders.
pub(crate) fn expand_dns_template(url: &str, encoded: &str) -> String {
    if url.contains("{?dns}") {
        url.replace("{?dns}", &format!("?dns={encoded}"))
    } else if url.contains("{dns}") {
        url.replace("{dns}", encoded)
    } else {
        format!("{url}?dns={encoded}")
    }
}

/// DNS-over-HTTPS request method (§4.1 "DoH-specific variation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DohMethod {
    Get,
    Post,
}

/// DNS-over-HTTPS client (RFC 8484) over HTTP/2, via `reqwest`.
///
/// `url` may be an RFC 6570 template containing a `dns` variable
/// (`https://dns.example/dns-query{?dns}`); a plain URL with no template is
/// used as-is for `POST` and gets `?dns=...` appended for `GET`.
#[derive(Debug, Clone)]
pub struct DohClient {
    id: String,
    url: String,
    method: DohMethod,
    client: reqwest::Client,
}

impl DohClient {
    pub fn new(id: impl Into<String>, url: impl Into<String>, method: DohMethod) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .build()
            .map_err(|e| UpstreamError::Dial(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            url: url.into(),
            method,
            client,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn expand_template(&self, encoded: &str) -> String {
        expand_dns_template(&self.url, encoded)
    }

    pub async fn query(&self, query: &DnsMessage, timeout: Duration) -> Result<DnsMessage, UpstreamError> {
        let bytes = query.to_wire().map_err(UpstreamError::Encode)?;

        let request = match self.method {
            DohMethod::Post => self
                .client
                .post(&self.url)
                .header(reqwest::header::CONTENT_TYPE, "application/dns-message")
                .header(reqwest::header::ACCEPT, "application/dns-message")
                .body(bytes)
                .timeout(timeout),
            DohMethod::Get => {
                let encoded = URL_SAFE_NO_PAD.encode(&bytes);
                let url = self.expand_template(&encoded);
                self.client
                    .get(url)
                    .header(reqwest::header::ACCEPT, "application/dns-message")
                    .timeout(timeout)
            }
        };

        let response = request.send().await.map_err(|e| UpstreamError::Dial(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Dial(format!("HTTP status {}", response.status())));
        }
        let body = response.bytes().await.map_err(|e| UpstreamError::Dial(e.to_string()))?;

        let decoded = DnsMessage::from_wire(&body).map_err(|_| UpstreamError::Decode)?;
        if !decoded.question_matches(query) {
            return Err(UpstreamError::Decode);
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_mark_template_expands_in_place() {
        let client = DohClient::new("doh", "https://dns.example/dns-query{?dns}", DohMethod::Get).unwrap();
        assert_eq!(client.expand_template("AAA"), "https://dns.example/dns-query?dns=AAA");
    }

    #[test]
    fn bare_url_gets_the_param_appended() {
        let client = DohClient::new("doh", "https://dns.example/dns-query", DohMethod::Get).unwrap();
        assert_eq!(client.expand_template("AAA"), "https://dns.example/dns-query?dns=AAA");
    }
}
