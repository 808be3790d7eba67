//! Decoding the `RX_SITE` / `BAND` path components embedded in a bundle's
//! directory layout: `wsprdaemon/{spots,noise}/<RX_SITE>/<RECEIVER>/<BAND>/...`.

use regex::Regex;
use std::sync::OnceLock;

/// `RX_SITE` is `CALLSIGN=SUFFIX_GRID`, where `=` substitutes for `/` in the
/// callsign and the trailing token is a Maidenhead grid.
fn rx_site_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<call>.+)_(?P<grid>[A-Ra-r]{2}[0-9]{2}([A-Xa-x]{2})?)$").unwrap()
    })
}

/// Decode an `RX_SITE` directory component into `(rx_sign, rx_loc)`.
/// `=` is translated back to `/` in the callsign. Returns the raw string
/// as the callsign with an empty grid when the pattern doesn't match.
#[must_use]
pub fn decode_rx_site_dir(rx_site_dir: &str) -> (String, String) {
    match rx_site_re().captures(rx_site_dir) {
        Some(caps) => {
            let call = caps["call"].replace('=', "/");
            let grid = caps["grid"].to_string();
            (call, grid)
        }
        None => (rx_site_dir.replace('=', "/"), String::new()),
    }
}

/// Decode a `BAND` directory component (e.g. `17`, `60eu`) into its
/// integer band in metres, taken from the numeric prefix.
#[must_use]
pub fn band_str_to_meters(band_str: &str) -> Option<i32> {
    let digits: String = band_str.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_callsign() {
        assert_eq!(
            decode_rx_site_dir("AC0G_EN16ov"),
            ("AC0G".to_string(), "EN16ov".to_string())
        );
    }

    #[test]
    fn decodes_slash_suffixed_callsign() {
        assert_eq!(
            decode_rx_site_dir("AC0G=ND_EN16ov"),
            ("AC0G/ND".to_string(), "EN16ov".to_string())
        );
    }

    #[test]
    fn band_prefix_handles_suffix() {
        assert_eq!(band_str_to_meters("60eu"), Some(60));
        assert_eq!(band_str_to_meters("17"), Some(17));
    }

    #[test]
    fn band_prefix_rejects_non_numeric() {
        assert_eq!(band_str_to_meters("eu"), None);
    }
}
