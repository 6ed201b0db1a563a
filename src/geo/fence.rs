//! Territory classification for inbound requests.
//!
//! Two interchangeable strategies, both failing closed:
//! - country code from the edge platform (preferred, used by the gate)
//! - IP range membership against the fixed ISP table (fallback)

use std::collections::HashSet;

use crate::config::GeoConfig;
use crate::geo::cidr::{ip_to_number, territory_ranges, CidrRange};
use crate::geo::client_ip::UNKNOWN_IP;

const PRIVATE_PREFIXES: &[&str] = &["127.", "10.", "172.16.", "192.168."];

/// Immutable geo-fence compiled once from configuration.
#[derive(Debug, Clone)]
pub struct GeoFence {
    designated_country: String,
    allowed_countries: HashSet<String>,
    ip_whitelist: HashSet<String>,
    local_override: bool,
    ranges: Vec<CidrRange>,
}

impl GeoFence {
    pub fn new(config: &GeoConfig) -> Self {
        // Outside production only the non-production whitelist applies.
        let whitelist = if config.development_mode {
            &config.ip_whitelist_dev
        } else {
            &config.ip_whitelist
        };

        Self {
            designated_country: config.designated_country.clone(),
            allowed_countries: config.allowed_countries.iter().cloned().collect(),
            ip_whitelist: whitelist.iter().cloned().collect(),
            local_override: config.local_override(),
            ranges: territory_ranges(),
        }
    }

    /// Country-code strategy.
    ///
    /// An absent code is admitted only under the development double flag.
    pub fn is_country_allowed(&self, country: Option<&str>) -> bool {
        match country {
            Some(code) => code == self.designated_country || self.allowed_countries.contains(code),
            None => self.local_override,
        }
    }

    /// IP-range strategy.
    pub fn is_ip_allowed(&self, ip: &str) -> bool {
        if self.ip_whitelist.contains(ip) {
            return true;
        }

        if self.local_override
            && (ip == UNKNOWN_IP || PRIVATE_PREFIXES.iter().any(|p| ip.starts_with(p)))
        {
            return true;
        }

        let ip_num = ip_to_number(ip);
        self.ranges.iter().any(|range| range.contains(ip_num))
    }

    pub fn designated_country(&self) -> &str {
        &self.designated_country
    }
}
