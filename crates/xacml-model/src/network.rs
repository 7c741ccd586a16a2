// network.rs - ipAddress and dnsName datatypes.
//
// ipAddress: `address[/mask][:portrange]`, IPv6 addresses and masks in
// brackets, e.g. `[2001:db8::1]/[ffff::]:443`.
// dnsName: `hostname[:portrange]`, where the leftmost label may be `*`.

use std::fmt;
use std::net::IpAddr;

use crate::error::ValueError;

/// `80`, `80-90`, `-1023` or `1024-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub lower: Option<u16>,
    pub upper: Option<u16>,
}

impl PortRange {
    pub fn parse(datatype: &str, lexical: &str, raw: &str) -> Result<Self, ValueError> {
        let port = |s: &str| -> Result<Option<u16>, ValueError> {
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u16>()
                .map(Some)
                .map_err(|_| ValueError::syntax(datatype, lexical, "invalid port"))
        };
        let range = match raw.split_once('-') {
            Some((lower, upper)) => PortRange {
                lower: port(lower)?,
                upper: port(upper)?,
            },
            None => {
                let single = port(raw)?;
                if single.is_none() {
                    return Err(ValueError::syntax(datatype, lexical, "empty port range"));
                }
                PortRange {
                    lower: single,
                    upper: single,
                }
            }
        };
        if let (Some(lower), Some(upper)) = (range.lower, range.upper) {
            if lower > upper {
                return Err(ValueError::syntax(datatype, lexical, "port range is inverted"));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.lower.map_or(true, |l| port >= l) && self.upper.map_or(true, |u| port <= u)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u => write!(f, "{}", l),
            (lower, upper) => {
                if let Some(l) = lower {
                    write!(f, "{}", l)?;
                }
                f.write_str("-")?;
                if let Some(u) = upper {
                    write!(f, "{}", u)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpAddressValue {
    pub address: IpAddr,
    pub mask: Option<IpAddr>,
    pub ports: Option<PortRange>,
}

impl IpAddressValue {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let syntax = |reason: &str| ValueError::syntax("ipAddress", lexical, reason);
        let trimmed = lexical.trim();

        if let Some(rest) = trimmed.strip_prefix('[') {
            let (address, mut rest) = rest.split_once(']').ok_or_else(|| syntax("missing ']'"))?;
            let address: IpAddr = address.parse().map_err(|_| syntax("invalid IPv6 address"))?;
            if !address.is_ipv6() {
                return Err(syntax("bracketed address must be IPv6"));
            }
            let mut mask = None;
            if let Some(after) = rest.strip_prefix("/[") {
                let (m, after) = after.split_once(']').ok_or_else(|| syntax("missing ']'"))?;
                mask = Some(m.parse().map_err(|_| syntax("invalid IPv6 mask"))?);
                rest = after;
            }
            let ports = match rest.strip_prefix(':') {
                Some(p) => Some(PortRange::parse("ipAddress", lexical, p)?),
                None if rest.is_empty() => None,
                None => return Err(syntax("unexpected trailing characters")),
            };
            return Ok(Self {
                address,
                mask,
                ports,
            });
        }

        let (host, ports) = match trimmed.split_once(':') {
            Some((host, p)) => (host, Some(PortRange::parse("ipAddress", lexical, p)?)),
            None => (trimmed, None),
        };
        let (address, mask) = match host.split_once('/') {
            Some((a, m)) => (a, Some(m)),
            None => (host, None),
        };
        let address: IpAddr = address.parse().map_err(|_| syntax("invalid IPv4 address"))?;
        if !address.is_ipv4() {
            return Err(syntax("IPv6 addresses must be bracketed"));
        }
        let mask = mask
            .map(|m| m.parse::<IpAddr>().map_err(|_| syntax("invalid IPv4 mask")))
            .transpose()?;
        Ok(Self {
            address,
            mask,
            ports,
        })
    }
}

impl fmt::Display for IpAddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            IpAddr::V6(a) => {
                write!(f, "[{}]", a)?;
                if let Some(mask) = &self.mask {
                    write!(f, "/[{}]", mask)?;
                }
            }
            IpAddr::V4(a) => {
                write!(f, "{}", a)?;
                if let Some(mask) = &self.mask {
                    write!(f, "/{}", mask)?;
                }
            }
        }
        if let Some(ports) = &self.ports {
            write!(f, ":{}", ports)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsNameValue {
    /// Lower-cased host name, possibly starting with `*.`.
    pub host: String,
    pub ports: Option<PortRange>,
}

impl DnsNameValue {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let trimmed = lexical.trim();
        let (host, ports) = match trimmed.split_once(':') {
            Some((host, p)) => (host, Some(PortRange::parse("dnsName", lexical, p)?)),
            None => (trimmed, None),
        };
        if host.is_empty() {
            return Err(ValueError::syntax("dnsName", lexical, "empty host name"));
        }
        for (i, label) in host.split('.').enumerate() {
            let valid = if i == 0 && label == "*" {
                true
            } else {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            };
            if !valid {
                return Err(ValueError::syntax(
                    "dnsName",
                    lexical,
                    format!("invalid label '{}'", label),
                ));
            }
        }
        Ok(Self {
            host: host.to_ascii_lowercase(),
            ports,
        })
    }
}

impl fmt::Display for DnsNameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)?;
        if let Some(ports) = &self.ports {
            write!(f, ":{}", ports)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_with_mask_and_ports() {
        let ip = IpAddressValue::parse("10.0.0.0/255.0.0.0:80-443").unwrap();
        assert!(ip.address.is_ipv4());
        assert!(ip.mask.is_some());
        let ports = ip.ports.unwrap();
        assert!(ports.contains(80) && ports.contains(443) && !ports.contains(8080));
        assert_eq!(ip.to_string(), "10.0.0.0/255.0.0.0:80-443");
    }

    #[test]
    fn ipv6_is_bracketed() {
        let ip = IpAddressValue::parse("[2001:db8::1]/[ffff:ffff::]:443").unwrap();
        assert!(ip.address.is_ipv6());
        assert_eq!(ip.ports.unwrap().lower, Some(443));
        assert!(IpAddressValue::parse("2001:db8::1").is_err());
    }

    #[test]
    fn open_port_ranges() {
        let ip = IpAddressValue::parse("192.168.1.1:-1023").unwrap();
        let ports = ip.ports.unwrap();
        assert!(ports.contains(1) && !ports.contains(1024));
        assert_eq!(ports.to_string(), "-1023");
        assert!(IpAddressValue::parse("192.168.1.1:90-80").is_err());
    }

    #[test]
    fn dns_name_wildcard_and_case() {
        let name = DnsNameValue::parse("*.Example.COM:8080").unwrap();
        assert_eq!(name.host, "*.example.com");
        assert_eq!(name.to_string(), "*.example.com:8080");
        assert!(DnsNameValue::parse("www.*.com").is_err());
        assert!(DnsNameValue::parse("-bad.example.com").is_err());
    }
}
