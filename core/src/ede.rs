//! RFC 8914 Extended DNS Error support.
//!
//! `hickory-proto`'s typed `EdnsOption` enum predates RFC 8914, so the option
//! is built and read as its raw wire encoding (2-byte info-code, followed by
//! optional UTF-8 extra text) under the generic "unknown option" escape
//! hatch every EDNS option registry needs.

use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};

use crate::message::DnsMessage;

/// The OPT option code assigned to Extended DNS Error by RFC 8914.
const EDE_OPTION_CODE: u16 = 15;

/// A subset of the IANA "Extended DNS Error Codes" registry that the
/// blocklist/filter modifiers attach to their short-circuit responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedErrorCode {
    Blocked,
    Filtered,
    Forged,
    CensoredOther(u16),
}

impl ExtendedErrorCode {
    fn info_code(self) -> u16 {
        match self {
            ExtendedErrorCode::Blocked => 15,
            ExtendedErrorCode::Filtered => 17,
            ExtendedErrorCode::Forged => 20,
            ExtendedErrorCode::CensoredOther(code) => code,
        }
    }
}

/// Attaches an Extended DNS Error option to `response`, with an optional
/// human-readable explanation.
pub fn attach_extended_error(response: &mut DnsMessage, code: ExtendedErrorCode, extra_text: Option<&str>) {
    let mut bytes = code.info_code().to_be_bytes().to_vec();
    if let Some(text) = extra_text {
        bytes.extend_from_slice(text.as_bytes());
    }
    let edns = response.ensure_edns(1232);
    edns.options_mut()
        .insert(EdnsOption::Unknown(EDE_OPTION_CODE, bytes));
}

/// Reads back an Extended DNS Error option, if present, as `(info_code, extra_text)`.
pub fn read_extended_error(response: &DnsMessage) -> Option<(u16, Option<String>)> {
    let edns = response.edns()?;
    let EdnsOption::Unknown(code, bytes) = edns.options().get(EdnsCode::Unknown(EDE_OPTION_CODE))? else {
        return None;
    };
    if *code != EDE_OPTION_CODE || bytes.len() < 2 {
        return None;
    }
    let info_code = u16::from_be_bytes([bytes[0], bytes[1]]);
    let extra_text = if bytes.len() > 2 {
        String::from_utf8(bytes[2..].to_vec()).ok()
    } else {
        None
    };
    Some((info_code, extra_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;

    #[test]
    fn round_trips_info_code_and_text() {
        let mut response = crate::testing::fixed_query("example.com.", RecordType::A);
        attach_extended_error(&mut response, ExtendedErrorCode::Blocked, Some("matched rule r1"));

        let (code, text) = read_extended_error(&response).unwrap();
        assert_eq!(code, 15);
        assert_eq!(text.as_deref(), Some("matched rule r1"));
    }

    #[test]
    fn absent_when_never_attached() {
        let response = crate::testing::fixed_query("example.com.", RecordType::A);
        assert!(read_extended_error(&response).is_none());
    }
}
