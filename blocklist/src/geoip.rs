use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, Reader};

use crate::matcher::{Database, MatchResult};

/// Wraps a MaxMind GeoIP2 database and tests the resolved geoname id against
/// an in-memory set (§3 "GeoIP").
pub struct GeoIp {
    list_name: String,
    reader: Reader<Vec<u8>>,
    geoname_ids: HashSet<u32>,
}

impl std::fmt::Debug for GeoIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIp")
            .field("list_name", &self.list_name)
            .field("geoname_ids", &self.geoname_ids)
            .finish()
    }
}

impl GeoIp {
    pub fn open(list_name: impl Into<String>, path: impl AsRef<Path>, geoname_ids: HashSet<u32>) -> Result<Self, maxminddb::MaxMindDbError> {
        Ok(Self {
            list_name: list_name.into(),
            reader: Reader::open_readfile(path)?,
            geoname_ids,
        })
    }

    fn lookup_geoname_id(&self, addr: IpAddr) -> Option<u32> {
        let record: geoip2::Country = self.reader.lookup(addr).ok()?;
        record.country.and_then(|c| c.geoname_id)
    }
}

impl Database for GeoIp {
    fn match_addr(&self, addr: IpAddr) -> Option<MatchResult> {
        let geoname_id = self.lookup_geoname_id(addr)?;
        if self.geoname_ids.contains(&geoname_id) {
            Some(MatchResult::new(self.list_name.clone(), geoname_id.to_string()))
        } else {
            None
        }
    }
}
