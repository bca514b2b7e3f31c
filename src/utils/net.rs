//! IPv4 allow-list matching: exact addresses and CIDR blocks.

use std::net::Ipv4Addr;

/// True when `ip` matches at least one allow-list entry. Entries are exact
/// dotted quads or `base/prefix` CIDR blocks; malformed entries never match.
pub fn ip_allowed(ip: &str, allow_list: &[String]) -> bool {
    let Ok(addr) = ip.parse::<Ipv4Addr>() else {
        return false;
    };
    allow_list.iter().any(|rule| rule_matches(addr, rule))
}

fn rule_matches(addr: Ipv4Addr, rule: &str) -> bool {
    match rule.split_once('/') {
        None => match rule.parse::<Ipv4Addr>() {
            Ok(allowed) => allowed == addr,
            Err(_) => {
                tracing::debug!(rule, "unparseable allow-list entry");
                false
            }
        },
        Some((base, prefix)) => {
            let (Ok(base), Ok(prefix)) = (base.parse::<Ipv4Addr>(), prefix.parse::<u32>()) else {
                tracing::debug!(rule, "unparseable allow-list entry");
                return false;
            };
            if prefix > 32 {
                return false;
            }
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - prefix)
            };
            (u32::from(addr) & mask) == (u32::from(base) & mask)
        }
    }
}
