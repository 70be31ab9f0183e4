//! Record-type classification
//!
//! Decides whether an IP string belongs in an A or an AAAA record. A
//! configured override can force the outcome; anything unrecognized defers
//! to detection rather than erroring, so a typo in the config degrades to
//! auto-detection instead of taking the updater down.

use std::net::IpAddr;

/// DNS record kind derived from an IP literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Input did not parse as an IP literal
    Invalid,
}

impl RecordKind {
    /// Wire name of the record type, if there is one
    pub fn dns_type(self) -> Option<&'static str> {
        match self {
            RecordKind::A => Some("A"),
            RecordKind::Aaaa => Some("AAAA"),
            RecordKind::Invalid => None,
        }
    }
}

/// Classify an IP string by parsing it as an IP literal
pub fn classify(ip: &str) -> RecordKind {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => RecordKind::A,
        Ok(IpAddr::V6(_)) => RecordKind::Aaaa,
        Err(_) => RecordKind::Invalid,
    }
}

/// Classify with a configured override.
///
/// `"a"` and `"aaaa"` (case-insensitive) force the outcome; `"auto"`, the
/// empty string and any unrecognized value defer to [`classify`].
pub fn kind_for(ip: &str, override_type: &str) -> RecordKind {
    match override_type.to_ascii_lowercase().as_str() {
        "a" => RecordKind::A,
        "aaaa" => RecordKind::Aaaa,
        _ => classify(ip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ipv4() {
        assert_eq!(classify("192.0.2.1"), RecordKind::A);
    }

    #[test]
    fn classifies_ipv6() {
        assert_eq!(classify("2001:db8::1"), RecordKind::Aaaa);
    }

    #[test]
    fn rejects_non_ip() {
        assert_eq!(classify("not-an-ip"), RecordKind::Invalid);
    }

    #[test]
    fn override_forces_kind() {
        // The override wins even when detection would disagree
        assert_eq!(kind_for("192.0.2.1", "aaaa"), RecordKind::Aaaa);
        assert_eq!(kind_for("2001:db8::1", "A"), RecordKind::A);
    }

    #[test]
    fn auto_and_unknown_overrides_defer_to_detection() {
        assert_eq!(kind_for("192.0.2.1", "auto"), RecordKind::A);
        assert_eq!(kind_for("192.0.2.1", ""), RecordKind::A);
        assert_eq!(kind_for("2001:db8::1", "cname"), RecordKind::Aaaa);
    }

    #[test]
    fn dns_type_names() {
        assert_eq!(RecordKind::A.dns_type(), Some("A"));
        assert_eq!(RecordKind::Aaaa.dns_type(), Some("AAAA"));
        assert_eq!(RecordKind::Invalid.dns_type(), None);
    }
}
