// names.rs - rfc822Name and x500Name.
//
// Both types have comparison rules that differ from plain strings:
// - rfc822Name: local part is case-sensitive, domain is case-insensitive.
// - x500Name: compared RDN by RDN after RFC 2253 normalization, and
//   x500Name-match is a suffix test over the RDN sequence.

use std::fmt;

use crate::error::ValueError;

/// An e-mail style name, `local@domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rfc822Name {
    local: String,
    /// Lower-cased at parse time.
    domain: String,
}

impl Rfc822Name {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let trimmed = lexical.trim();
        let (local, domain) = trimmed
            .rsplit_once('@')
            .ok_or_else(|| ValueError::syntax("rfc822Name", lexical, "missing '@'"))?;
        if local.is_empty() || domain.is_empty() || local.contains('@') {
            return Err(ValueError::syntax(
                "rfc822Name",
                lexical,
                "expected exactly one '@' between non-empty parts",
            ));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValueError::syntax("rfc822Name", lexical, "contains whitespace"));
        }
        Ok(Self {
            local: local.to_string(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn local_part(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// rfc822Name-match semantics.
    ///
    /// - `anne@sun.com` matches that exact mailbox (domain case-insensitive)
    /// - `sun.com` matches any mailbox at exactly that domain
    /// - `.sun.com` matches any mailbox in any subdomain of sun.com
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.contains('@') {
            return Rfc822Name::parse(pattern)
                .map(|p| &p == self)
                .unwrap_or(false);
        }
        let pattern = pattern.to_ascii_lowercase();
        if pattern.starts_with('.') {
            self.domain.ends_with(&pattern)
        } else {
            self.domain == pattern
        }
    }
}

impl fmt::Display for Rfc822Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// One attribute-type-and-value of an RDN, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Ava {
    attribute_type: String,
    value: String,
}

/// A distinguished name in RFC 2253 string form.
#[derive(Debug, Clone)]
pub struct X500Name {
    lexical: String,
    /// Most specific RDN first, as written. Each RDN's AVAs are sorted so
    /// multi-valued RDNs compare independently of their written order.
    rdns: Vec<Vec<Ava>>,
}

impl X500Name {
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let trimmed = lexical.trim();
        let mut rdns = Vec::new();
        if !trimmed.is_empty() {
            for rdn in split_unescaped(trimmed, &[',', ';'])
                .map_err(|reason| ValueError::syntax("x500Name", lexical, reason))?
            {
                let mut avas = Vec::new();
                for ava in split_unescaped(rdn, &['+'])
                    .map_err(|reason| ValueError::syntax("x500Name", lexical, reason))?
                {
                    avas.push(parse_ava(ava).map_err(|reason| {
                        ValueError::syntax("x500Name", lexical, reason)
                    })?);
                }
                avas.sort();
                rdns.push(avas);
            }
        }
        Ok(Self {
            lexical: trimmed.to_string(),
            rdns,
        })
    }

    pub fn rdn_count(&self) -> usize {
        self.rdns.len()
    }

    /// x500Name-match: true when `self` equals a terminal sequence of
    /// `other`'s RDNs, e.g. `O=Medico Corp,C=US` matches
    /// `cn=John Smith,o=Medico Corp, c=US`.
    pub fn is_suffix_of(&self, other: &X500Name) -> bool {
        other.rdns.ends_with(&self.rdns)
    }
}

impl PartialEq for X500Name {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl Eq for X500Name {}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical)
    }
}

/// Split on any of `separators`, honoring backslash escapes and quotes.
fn split_unescaped<'a>(input: &'a str, separators: &[char]) -> Result<Vec<&'a str>, String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            c if !quoted && separators.contains(&c) => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if escaped {
        return Err("dangling escape".to_string());
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn parse_ava(raw: &str) -> Result<Ava, String> {
    let (attribute_type, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not type=value", raw.trim()))?;
    let attribute_type = attribute_type.trim();
    if attribute_type.is_empty() {
        return Err("empty attribute type".to_string());
    }
    Ok(Ava {
        attribute_type: attribute_type.to_ascii_lowercase(),
        value: normalize_value(value.trim())?,
    })
}

/// Unescape, unquote, collapse internal whitespace and case-fold.
fn normalize_value(raw: &str) -> Result<String, String> {
    let raw = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => inner,
        None => raw,
    };
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let next = chars.next().ok_or("dangling escape")?;
        if next.is_ascii_hexdigit() {
            if let Some(low) = chars.peek().copied().filter(char::is_ascii_hexdigit) {
                chars.next();
                let byte = u8::from_str_radix(&format!("{}{}", next, low), 16)
                    .map_err(|e| e.to_string())?;
                out.push(char::from(byte));
                continue;
            }
        }
        out.push(next);
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(collapsed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc822_domain_is_case_insensitive_local_part_is_not() {
        let a = Rfc822Name::parse("Anderson@SUN.COM").unwrap();
        let b = Rfc822Name::parse("Anderson@sun.com").unwrap();
        let c = Rfc822Name::parse("anderson@sun.com").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rfc822_match_patterns() {
        let name = Rfc822Name::parse("Anderson@east.sun.com").unwrap();
        assert!(name.matches_pattern("Anderson@EAST.sun.com"));
        assert!(!name.matches_pattern("anderson@east.sun.com"));
        assert!(name.matches_pattern("east.sun.com"));
        assert!(!name.matches_pattern("sun.com"));
        assert!(name.matches_pattern(".sun.com"));
        assert!(!name.matches_pattern(".east.sun.com"));
    }

    #[test]
    fn rfc822_rejects_malformed() {
        assert!(Rfc822Name::parse("no-at-sign").is_err());
        assert!(Rfc822Name::parse("@domain").is_err());
        assert!(Rfc822Name::parse("a@b@c").is_err());
    }

    #[test]
    fn x500_equality_ignores_case_and_spacing() {
        let a = X500Name::parse("cn=John Smith, o=Medico Corp, c=US").unwrap();
        let b = X500Name::parse("CN=john  smith,O=MEDICO CORP,C=us").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rdn_count(), 3);
    }

    #[test]
    fn x500_match_is_terminal_rdn_sequence() {
        let org = X500Name::parse("O=Medico Corp,C=US").unwrap();
        let person = X500Name::parse("cn=John Smith,o=Medico Corp, c=US").unwrap();
        assert!(org.is_suffix_of(&person));
        assert!(!person.is_suffix_of(&org));

        let other = X500Name::parse("O=Medico Corp,C=CA").unwrap();
        assert!(!other.is_suffix_of(&person));
    }

    #[test]
    fn x500_handles_escapes_and_multivalued_rdns() {
        let escaped = X500Name::parse(r"CN=Smith\, John,O=Acme").unwrap();
        assert_eq!(escaped.rdn_count(), 2);

        let a = X500Name::parse("CN=Steve+UID=123,O=Acme").unwrap();
        let b = X500Name::parse("UID=123+CN=Steve,O=Acme").unwrap();
        assert_eq!(a, b);

        let quoted = X500Name::parse(r#"CN="Smith, John",O=Acme"#).unwrap();
        assert_eq!(quoted, escaped);
    }

    #[test]
    fn x500_rejects_malformed() {
        assert!(X500Name::parse("not a dn").is_err());
        assert!(X500Name::parse(r"CN=trailing\").is_err());
    }
}
