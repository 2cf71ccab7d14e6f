//! MAC address normalization
//! Every address that comes from a user, a config file or an advertisement
//! goes through here before it is compared or used as a cache key.

use std::sync::OnceLock;

use regex::Regex;

fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)([0-9a-f]{2}:){5}[0-9a-f]{2}$").expect("static MAC pattern")
    })
}

fn embedded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").expect("static MAC pattern")
    })
}

/// Canonicalizes a MAC-like string into lowercase `xx:xx:xx:xx:xx:xx`.
///
/// Inputs that do not carry exactly twelve hex digits are returned lowercased
/// but otherwise untouched. Only an empty input yields `None`.
pub fn normalize(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    if canonical_pattern().is_match(input) {
        return Some(input.to_lowercase());
    }

    let digits = hex_digits(input);
    if digits.len() == 12 {
        let octets: Vec<&str> = (0..12).step_by(2).map(|i| &digits[i..i + 2]).collect();
        return Some(octets.join(":"));
    }

    Some(input.to_lowercase())
}

/// Compares two addresses after normalizing both sides.
pub fn equals(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Lowercase hex digits of `input` with everything else stripped.
pub fn hex_digits(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Pulls the last MAC-looking run out of a platform device id
/// (e.g. `/org/bluez/hci0/dev_DD_0B_72_15_C3_39`).
pub fn extract_from_id(device_id: &str) -> Option<String> {
    embedded_pattern()
        .find_iter(device_id)
        .last()
        .and_then(|m| normalize(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_formats() {
        for input in ["AA:BB:CC:DD:EE:FF", "aabbccddeeff", "AA-BB-CC-DD-EE-FF", "aa.bb.cc.dd.ee.ff"] {
            assert_eq!(normalize(input).as_deref(), Some("aa:bb:cc:dd:ee:ff"), "{input}");
        }
    }

    #[test]
    fn normalizes_bare_hex_id() {
        assert_eq!(normalize("DD0B7215C339").as_deref(), Some("dd:0b:72:15:c3:39"));
    }

    #[test]
    fn keeps_non_mac_input_lowercased() {
        assert_eq!(normalize("C339").as_deref(), Some("c339"));
        assert_eq!(normalize("Living-Room").as_deref(), Some("living-room"));
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["DD0B7215C339", "AA-BB-CC-DD-EE-FF", "C339", "not a mac", "aa:bb:cc:dd:ee:ff:00"] {
            let once = normalize(input);
            let twice = once.as_deref().and_then(normalize);
            assert_eq!(once, twice, "{input}");
        }
    }

    #[test]
    fn equality_ignores_format() {
        assert!(equals("DD0B7215C339", "dd:0b:72:15:c3:39"));
        assert!(equals("dd:0b:72:15:c3:39", "DD0B7215C339"));
        assert!(equals("c339", "C339"));
        assert!(!equals("DD0B7215C339", "dd:0b:72:15:c3:38"));
        assert!(!equals("", ""));
    }

    #[test]
    fn extracts_mac_from_platform_id() {
        assert_eq!(
            extract_from_id("/org/bluez/hci0/dev_DD_0B_72_15_C3_39").as_deref(),
            Some("dd:0b:72:15:c3:39")
        );
        assert_eq!(extract_from_id("5C2A0F3E-1A2B-4C5D-8E9F-001122334455"), None);
    }
}
