//! Routing policy
//!
//! The forwarding decision is an ordered table of predicate -> route rules.
//! The first matching rule wins. Control suppression and broadcast handling
//! sit above the fast-path rule so a frame cannot reach the fast path by
//! also matching one of them.

use std::fmt;

use serde::Serialize;

use crate::config::ForwardPolicy;

use super::classify::Classification;

/// Destination class of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Slow/control consumer only
    Slow,
    /// Peer port only
    Other,
    /// Slow consumer and peer port, delivered identically
    Both,
    /// Fast-path consumer only
    Fast,
    /// Discarded
    Drop,
}

impl Route {
    pub const ALL: [Route; 5] = [Route::Slow, Route::Other, Route::Both, Route::Fast, Route::Drop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Slow => "slow",
            Route::Other => "other",
            Route::Both => "both",
            Route::Fast => "fast",
            Route::Drop => "drop",
        }
    }

    /// Index into per-route counters
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn to_slow(&self) -> bool {
        matches!(self, Route::Slow | Route::Both)
    }

    pub fn to_other(&self) -> bool {
        matches!(self, Route::Other | Route::Both)
    }

    pub fn to_fast(&self) -> bool {
        matches!(self, Route::Fast)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the routing table
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&Classification, &ForwardPolicy) -> bool,
    pub route: fn(&ForwardPolicy) -> Route,
}

/// Routing table in priority order
pub static RULES: [Rule; 6] = [
    Rule {
        name: "control-suppress",
        matches: |c, _| c.is_control_suppressed(),
        route: |_| Route::Slow,
    },
    Rule {
        name: "broadcast",
        matches: |c, _| c.is_broadcast(),
        route: |p| {
            if p.forward_broadcast {
                Route::Both
            } else {
                Route::Slow
            }
        },
    },
    Rule {
        name: "forward-non-local",
        matches: |c, p| !c.dst_is_local() && p.forward_non_local,
        route: |_| Route::Other,
    },
    Rule {
        name: "drop-non-local",
        matches: |c, p| !c.dst_is_local() && !p.forward_non_local,
        route: |_| Route::Drop,
    },
    Rule {
        name: "fast-path",
        matches: |c, _| c.is_fast_path(),
        route: |_| Route::Fast,
    },
    Rule {
        name: "default",
        matches: |_, _| true,
        route: |_| Route::Slow,
    },
];

/// Evaluate the routing table. Returns the route and the name of the rule that produced it.
pub fn decide(class: &Classification, policy: &ForwardPolicy) -> (Route, &'static str) {
    RULES
        .iter()
        .find(|rule| (rule.matches)(class, policy))
        .map(|rule| ((rule.route)(policy), rule.name))
        .unwrap_or((Route::Slow, "default"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Classification {
        Classification {
            dst_mac_hi: true,
            dst_mac_lo: true,
            ..Default::default()
        }
    }

    fn fast() -> Classification {
        Classification {
            is_ipv4: true,
            is_udp: true,
            dst_ip_match: true,
            dst_port_match: true,
            marker: true,
            ..local()
        }
    }

    fn broadcast() -> Classification {
        Classification {
            bcast_hi: true,
            bcast_lo: true,
            ..Default::default()
        }
    }

    const CLEAR: ForwardPolicy = ForwardPolicy {
        forward_non_local: false,
        forward_broadcast: false,
    };
    const ALL_SET: ForwardPolicy = ForwardPolicy {
        forward_non_local: true,
        forward_broadcast: true,
    };

    #[test]
    fn test_local_default_goes_slow() {
        assert_eq!(decide(&local(), &CLEAR), (Route::Slow, "default"));
        assert_eq!(decide(&local(), &ALL_SET), (Route::Slow, "default"));
    }

    #[test]
    fn test_broadcast_policy() {
        assert_eq!(decide(&broadcast(), &CLEAR).0, Route::Slow);
        assert_eq!(decide(&broadcast(), &ALL_SET), (Route::Both, "broadcast"));
    }

    #[test]
    fn test_non_local() {
        let other = Classification::default();
        assert_eq!(decide(&other, &CLEAR), (Route::Drop, "drop-non-local"));
        let fwd = ForwardPolicy {
            forward_non_local: true,
            forward_broadcast: false,
        };
        assert_eq!(decide(&other, &fwd), (Route::Other, "forward-non-local"));
    }

    #[test]
    fn test_fast_path() {
        assert_eq!(decide(&fast(), &CLEAR), (Route::Fast, "fast-path"));
    }

    #[test]
    fn test_control_suppress_beats_everything() {
        let c = Classification {
            is_icmp: true,
            icmp_no_fwd: true,
            ..fast()
        };
        assert_eq!(decide(&c, &ALL_SET), (Route::Slow, "control-suppress"));

        // Suppression applies even to frames that would otherwise be dropped
        let c = Classification {
            is_ipv4: true,
            is_icmp: true,
            icmp_no_fwd: true,
            ..Default::default()
        };
        assert_eq!(decide(&c, &CLEAR).0, Route::Slow);
    }

    #[test]
    fn test_broadcast_cannot_spoof_fast_path() {
        let c = Classification {
            bcast_hi: true,
            bcast_lo: true,
            ..fast()
        };
        assert_eq!(decide(&c, &CLEAR).0, Route::Slow);
        assert_eq!(decide(&c, &ALL_SET).0, Route::Both);
    }

    #[test]
    fn test_non_local_fast_candidate_is_not_fast() {
        let c = Classification {
            dst_mac_lo: false,
            ..fast()
        };
        assert_eq!(decide(&c, &CLEAR).0, Route::Drop);
    }

    #[test]
    fn test_table_ends_with_catch_all() {
        let last = RULES.last().unwrap();
        assert!((last.matches)(&Classification::default(), &CLEAR));
    }

    #[test]
    fn test_route_destinations() {
        assert!(Route::Both.to_slow() && Route::Both.to_other());
        assert!(!Route::Drop.to_slow() && !Route::Drop.to_other() && !Route::Drop.to_fast());
        assert_eq!(Route::ALL.map(|r| r.index()), [0, 1, 2, 3, 4]);
    }
}
