//! Consensus resolution over multiple IP discovery sources
//!
//! Public IP discovery endpoints are individually unreliable: rate limits,
//! stale CDN caches and regional routing all produce wrong or missing
//! answers. The resolver queries every configured source each cycle and
//! only trusts an answer that at least two independent sources agree on;
//! when no two sources agree, the declared order of the sources in the
//! configuration acts as a trust ranking and the first responding source
//! wins. A single compromised or glitching endpoint can therefore never
//! flip the DNS record on its own, while the fallback keeps the updater
//! live even under permanent disagreement.
//!
//! The election itself ([`elect`]) is a pure function over the observation
//! set, so the outcome is deterministic for a given configuration order.
//! That includes ties, which map-iteration approaches in similar tools
//! leave to chance.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::IpSourceSpec;
use crate::traits::{IpFamily, IpFetcher};

/// The per-cycle collection of successful source answers.
///
/// Entries are kept in the order the sources are declared in the
/// configuration; that order is the priority ranking every fallback rule
/// scans. Built fresh on each cycle, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationSet {
    entries: Vec<(String, String)>,
}

impl ObservationSet {
    /// Create an empty observation set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one source's answer. Call in source-priority order.
    pub fn record(&mut self, source: impl Into<String>, ip: impl Into<String>) {
        self.entries.push((source.into(), ip.into()));
    }

    /// Number of sources that reported
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no source reported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(source, ip)` pairs in priority order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, ip)| (s.as_str(), ip.as_str()))
    }
}

/// Elect the winning IP from an observation set.
///
/// - no observations: `None` ("undetermined")
/// - one observation: that IP, no voting
/// - otherwise, count how many sources reported each exact IP string:
///   - highest count ≥ 2: majority. Among several values tied at the
///     maximal count, the one reported by the earliest-listed source wins.
///   - highest count = 1 (full disagreement): the earliest-listed source's
///     IP wins.
pub fn elect(observations: &ObservationSet) -> Option<String> {
    if observations.is_empty() {
        return None;
    }

    if observations.len() == 1 {
        let (source, ip) = observations.iter().next()?;
        debug!("single source available, trusting {} from {}", ip, source);
        return Some(ip.to_string());
    }

    let mut votes: HashMap<&str, usize> = HashMap::new();
    for (_, ip) in observations.iter() {
        *votes.entry(ip).or_default() += 1;
    }
    let top = votes.values().copied().max().unwrap_or(0);

    if top >= 2 {
        // Majority. The priority scan doubles as the deterministic
        // tie-break among values sharing the maximal count.
        for (source, ip) in observations.iter() {
            if votes[ip] == top {
                debug!("majority IP {} ({} votes, first reported by {})", ip, top, source);
                return Some(ip.to_string());
            }
        }
        None
    } else {
        warn!("sources fully disagree, falling back to priority order");
        observations.iter().next().map(|(source, ip)| {
            debug!("priority IP {} from {}", ip, source);
            ip.to_string()
        })
    }
}

/// Orchestrates one resolution cycle: fan out to every configured source,
/// gather the answers, run the election.
pub struct ConsensusResolver {
    sources: Vec<IpSourceSpec>,
    family: Option<IpFamily>,
}

impl ConsensusResolver {
    /// Create a resolver over an ordered source list.
    ///
    /// `family` pins every fetch to one network family; pass `None` unless
    /// a record-type override demands a specific family.
    pub fn new(sources: Vec<IpSourceSpec>, family: Option<IpFamily>) -> Self {
        Self { sources, family }
    }

    /// The configured sources, in priority order
    pub fn sources(&self) -> &[IpSourceSpec] {
        &self.sources
    }

    /// Run one resolution cycle. `None` means "undetermined": no source
    /// produced a usable answer. A failed source is logged and skipped,
    /// never aborts the cycle.
    pub async fn resolve(&self, fetcher: &dyn IpFetcher) -> Option<String> {
        let observations = self.observe(fetcher).await;
        if observations.is_empty() {
            warn!("no IP source available this cycle");
        }
        elect(&observations)
    }

    async fn observe(&self, fetcher: &dyn IpFetcher) -> ObservationSet {
        let mut observations = ObservationSet::new();
        for source in &self.sources {
            match fetcher.fetch(source, self.family).await {
                Ok(ip) if !ip.is_empty() => {
                    debug!("IP source {} returned {}", source.name, ip);
                    observations.record(&source.name, ip);
                }
                Ok(_) => {
                    warn!("IP source {} returned an empty value", source.name);
                }
                Err(e) => {
                    warn!("IP source {} failed: {}", source.name, e);
                }
            }
        }
        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(entries: &[(&str, &str)]) -> ObservationSet {
        let mut set = ObservationSet::new();
        for (source, ip) in entries {
            set.record(*source, *ip);
        }
        set
    }

    #[test]
    fn empty_set_is_undetermined() {
        assert_eq!(elect(&ObservationSet::new()), None);
    }

    #[test]
    fn single_source_wins_without_voting() {
        let set = observations(&[("only", "198.51.100.7")]);
        assert_eq!(elect(&set), Some("198.51.100.7".to_string()));
    }

    #[test]
    fn majority_beats_priority() {
        // The top-priority source is outvoted by two agreeing sources.
        let set = observations(&[
            ("first", "1.1.1.1"),
            ("second", "9.9.9.9"),
            ("third", "9.9.9.9"),
        ]);
        assert_eq!(elect(&set), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn majority_wins_regardless_of_dissenters() {
        let set = observations(&[
            ("a", "203.0.113.5"),
            ("b", "10.0.0.1"),
            ("c", "203.0.113.5"),
            ("d", "172.16.0.9"),
        ]);
        assert_eq!(elect(&set), Some("203.0.113.5".to_string()));
    }

    #[test]
    fn full_disagreement_falls_back_to_priority() {
        let set = observations(&[
            ("a", "1.1.1.1"),
            ("b", "2.2.2.2"),
            ("c", "3.3.3.3"),
        ]);
        assert_eq!(elect(&set), Some("1.1.1.1".to_string()));
    }

    #[test]
    fn full_disagreement_is_deterministic() {
        let set = observations(&[
            ("a", "1.1.1.1"),
            ("b", "2.2.2.2"),
            ("c", "3.3.3.3"),
        ]);
        for _ in 0..32 {
            assert_eq!(elect(&set), Some("1.1.1.1".to_string()));
        }
    }

    #[test]
    fn tie_at_maximal_count_resolved_by_priority() {
        // Two values with two votes each: the one first reported by the
        // earliest-listed source must win, every time.
        let set = observations(&[
            ("a", "2.2.2.2"),
            ("b", "1.1.1.1"),
            ("c", "2.2.2.2"),
            ("d", "1.1.1.1"),
        ]);
        for _ in 0..32 {
            assert_eq!(elect(&set), Some("2.2.2.2".to_string()));
        }
    }

    #[test]
    fn voting_is_exact_string_match() {
        // b and c spell the same address differently; they must not pool
        // their votes, so this is a full disagreement and priority wins.
        let set = observations(&[
            ("a", "2001:db8::2"),
            ("b", "2001:0db8::1"),
            ("c", "2001:db8::1"),
        ]);
        assert_eq!(elect(&set), Some("2001:db8::2".to_string()));
    }
}
