//! Resolves loosely typed device identifiers against scan results.

use log::info;

use crate::core::bluetooth::DeviceAdvertisement;
use crate::core::mac;

/// Asks someone to pick among several candidates.
pub trait Disambiguator {
    /// Index into `candidates`, or `None` to decline.
    fn choose(&self, candidates: &[&DeviceAdvertisement]) -> Option<usize>;
}

/// Who, if anyone, can settle an ambiguous match.
pub enum MatchContext<'a> {
    /// Automated caller: the first candidate wins.
    Unattended,
    /// Operator-driven; without a channel to ask, the input is used as given.
    Interactive(Option<&'a dyn Disambiguator>),
}

/// Maps `user_input` to a device address.
///
/// Exact matches (after normalization, on address or raw id) win outright,
/// then hex-substring matches in either direction. With nothing matching
/// the normalized input is returned unchanged so the caller can still try
/// it. Only an empty input yields `None`.
pub fn resolve(user_input: &str, scan_results: &[DeviceAdvertisement], context: &MatchContext<'_>) -> Option<String> {
    let normalized = mac::normalize(user_input)?;

    if let Some(device) = scan_results
        .iter()
        .find(|d| mac::equals(&d.address, user_input) || mac::equals(&d.raw_id, user_input))
    {
        info!("Found exact match: {}", device.address);
        return Some(device.address.clone());
    }

    let candidates = partial_matches(user_input, scan_results);
    match candidates.as_slice() {
        [] => {
            info!("No match found, will use provided MAC address: {}", normalized);
            Some(normalized)
        }
        [only] => {
            info!("Found partial match: {}", only.address);
            Some(only.address.clone())
        }
        [first, ..] => {
            info!("Found {} possible matches", candidates.len());
            match context {
                MatchContext::Unattended => {
                    info!("Unattended: auto-selecting first device {}", first.address);
                    Some(first.address.clone())
                }
                MatchContext::Interactive(Some(disambiguator)) => {
                    match disambiguator.choose(&candidates).and_then(|i| candidates.get(i)) {
                        Some(chosen) => Some(chosen.address.clone()),
                        None => Some(normalized),
                    }
                }
                MatchContext::Interactive(None) => {
                    info!("Multiple matches found, will use provided MAC address: {}", normalized);
                    Some(normalized)
                }
            }
        }
    }
}

/// Devices whose address or raw id contains the input's hex digits, or is
/// contained in them.
pub fn partial_matches<'a>(user_input: &str, scan_results: &'a [DeviceAdvertisement]) -> Vec<&'a DeviceAdvertisement> {
    let target = mac::hex_digits(user_input);
    if target.is_empty() {
        return Vec::new();
    }

    let overlaps = |candidate: &str| {
        let candidate = mac::hex_digits(candidate);
        !candidate.is_empty() && (candidate.contains(&target) || target.contains(&candidate))
    };

    scan_results
        .iter()
        .filter(|d| overlaps(&d.address) || overlaps(&d.raw_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::{DeviceReading, DeviceType};

    fn device(address: &str, raw_id: &str) -> DeviceAdvertisement {
        DeviceAdvertisement {
            address: address.to_string(),
            raw_id: raw_id.to_string(),
            device_type: DeviceType::Unknown,
            reading: DeviceReading::Unknown,
            rssi: None,
        }
    }

    fn scan() -> Vec<DeviceAdvertisement> {
        vec![
            device("dd:0b:72:15:c3:39", "dd0b7215c339"),
            device("e1:22:33:44:55:66", "e12233445566"),
            device("e1:22:33:44:55:77", "e12233445577"),
        ]
    }

    struct PickLast;

    impl Disambiguator for PickLast {
        fn choose(&self, candidates: &[&DeviceAdvertisement]) -> Option<usize> {
            candidates.len().checked_sub(1)
        }
    }

    struct Decline;

    impl Disambiguator for Decline {
        fn choose(&self, _: &[&DeviceAdvertisement]) -> Option<usize> {
            None
        }
    }

    #[test]
    fn exact_match_in_any_format() {
        let results = scan();
        assert_eq!(
            resolve("DD-0B-72-15-C3-39", &results, &MatchContext::Unattended).as_deref(),
            Some("dd:0b:72:15:c3:39")
        );
    }

    #[test]
    fn unique_substring_resolves_to_full_address() {
        let results = scan();
        assert_eq!(
            resolve("C339", &results, &MatchContext::Interactive(None)).as_deref(),
            Some("dd:0b:72:15:c3:39")
        );
    }

    #[test]
    fn no_match_returns_normalized_input() {
        let results = scan();
        assert_eq!(
            resolve("AABBCCDDEEFF", &results, &MatchContext::Unattended).as_deref(),
            Some("aa:bb:cc:dd:ee:ff")
        );
        assert_eq!(resolve("", &results, &MatchContext::Unattended), None);
    }

    #[test]
    fn ambiguous_match_depends_on_context() {
        let results = scan();
        assert_eq!(
            resolve("e1223344", &results, &MatchContext::Unattended).as_deref(),
            Some("e1:22:33:44:55:66")
        );
        assert_eq!(
            resolve("e1223344", &results, &MatchContext::Interactive(None)).as_deref(),
            Some("e1223344")
        );
        assert_eq!(
            resolve("e1223344", &results, &MatchContext::Interactive(Some(&PickLast))).as_deref(),
            Some("e1:22:33:44:55:77")
        );
        assert_eq!(
            resolve("e1223344", &results, &MatchContext::Interactive(Some(&Decline))).as_deref(),
            Some("e1223344")
        );
    }

    #[test]
    fn empty_raw_id_does_not_match_everything() {
        let results = vec![device("dd:0b:72:15:c3:39", "")];
        assert!(partial_matches("aabb", &results).is_empty());
        assert!(partial_matches("zz", &results).is_empty());
    }
}
