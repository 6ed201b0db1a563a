//! Request classification.
//!
//! # Responsibilities
//! - Decide whether a path bypasses the gate entirely
//! - Pick the extra rate-limit bucket for a path (auth or api)
//! - Pick the privileged guard for a path (admin or vendor)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Auth endpoints take precedence over the api bucket
//! - Public paths under a guarded prefix are never guarded

use crate::config::GateConfig;
use crate::routing::matcher::{AnyMatcher, ExactPathMatcher, Matcher, PathPrefixMatcher, StaticAssetMatcher};

/// Extra bucket checked after the global one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    Auth,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Admin,
    Vendor,
}

#[derive(Debug)]
pub struct RouteTable {
    exempt: AnyMatcher,
    auth_paths: AnyMatcher,
    api: PathPrefixMatcher,
    admin_api: PathPrefixMatcher,
    vendor_api: PathPrefixMatcher,
    public: AnyMatcher,
    dashboard: PathPrefixMatcher,
}

impl RouteTable {
    /// `exempt_paths` are served by the gate itself and skip admission.
    pub fn new(config: &GateConfig, exempt_paths: &[&str]) -> Self {
        let mut exempt: Vec<Box<dyn Matcher>> = vec![Box::new(StaticAssetMatcher::default())];
        exempt.extend(
            exempt_paths
                .iter()
                .map(|p| Box::new(ExactPathMatcher::new(*p)) as Box<dyn Matcher>),
        );

        let dashboard = format!("{}/", config.admin_session.dashboard_prefix.trim_end_matches('/'));

        Self {
            exempt: AnyMatcher::new(exempt),
            auth_paths: AnyMatcher::exact_paths(config.rate_limit.auth_paths.iter().cloned()),
            api: PathPrefixMatcher::new(config.rate_limit.api_prefix.clone()),
            admin_api: PathPrefixMatcher::new(config.auth.admin_api_prefix.clone()),
            vendor_api: PathPrefixMatcher::new(config.auth.vendor_api_prefix.clone()),
            public: AnyMatcher::exact_paths(config.auth.public_paths.iter().cloned()),
            dashboard: PathPrefixMatcher::new(dashboard),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt.matches(path)
    }

    pub fn rate_class(&self, path: &str) -> Option<RateClass> {
        if self.auth_paths.matches(path) {
            Some(RateClass::Auth)
        } else if self.api.matches(path) {
            Some(RateClass::Api)
        } else {
            None
        }
    }

    pub fn guard(&self, path: &str) -> Option<Guard> {
        if self.public.matches(path) {
            None
        } else if self.admin_api.matches(path) {
            Some(Guard::Admin)
        } else if self.vendor_api.matches(path) {
            Some(Guard::Vendor)
        } else {
            None
        }
    }

    /// Admin dashboard pages subject to the inactivity timeout.
    pub fn is_dashboard_page(&self, path: &str) -> bool {
        self.dashboard.matches(path) && !path.trim_end_matches('/').ends_with("/login")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(&GateConfig::default(), &["/_gate/health"])
    }

    #[test]
    fn test_exemptions() {
        let t = table();
        assert!(t.is_exempt("/_gate/health"));
        assert!(t.is_exempt("/_next/static/app.js"));
        assert!(!t.is_exempt("/_gate/status"));
        assert!(!t.is_exempt("/"));
    }

    #[test]
    fn test_rate_class() {
        let t = table();
        assert_eq!(t.rate_class("/api/admin/login"), Some(RateClass::Auth));
        assert_eq!(t.rate_class("/api/vendor/login"), Some(RateClass::Auth));
        assert_eq!(t.rate_class("/api/products"), Some(RateClass::Api));
        assert_eq!(t.rate_class("/products"), None);
    }

    #[test]
    fn test_guards() {
        let t = table();
        assert_eq!(t.guard("/api/admin/orders"), Some(Guard::Admin));
        assert_eq!(t.guard("/api/vendor/products"), Some(Guard::Vendor));
        assert_eq!(t.guard("/api/admin/login"), None);
        assert_eq!(t.guard("/api/vendor/validate-promo"), None);
        assert_eq!(t.guard("/api/products"), None);
    }

    #[test]
    fn test_dashboard_pages() {
        let t = table();
        assert!(t.is_dashboard_page("/fassalapremierprojectbsk/orders"));
        assert!(!t.is_dashboard_page("/fassalapremierprojectbsk/login"));
        assert!(!t.is_dashboard_page("/fassalapremierprojectbsk"));
        assert!(!t.is_dashboard_page("/shop"));
    }
}
