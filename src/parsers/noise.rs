//! Noise-line parser: filename timestamp + exactly 15 whitespace-separated
//! body tokens per `*_noise.txt` file.

use crate::store::schema::NoiseRecord;
use regex::Regex;
use std::sync::OnceLock;
use time::OffsetDateTime;

fn noise_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{6})_(\d{4})_noise\.txt$").unwrap())
}

/// Extract the timestamp embedded in a noise filename, e.g.
/// `230615_1200_noise.txt`.
#[must_use]
pub fn noise_timestamp_from_filename(filename: &str) -> Option<OffsetDateTime> {
    let caps = noise_filename_re().captures(filename)?;
    let date = &caps[1];
    let time_s = &caps[2];

    let yy: i32 = date[0..2].parse().ok()?;
    let mm: u8 = date[2..4].parse().ok()?;
    let dd: u8 = date[4..6].parse().ok()?;
    let hh: u8 = time_s[0..2].parse().ok()?;
    let min: u8 = time_s[2..4].parse().ok()?;

    let month = time::Month::try_from(mm).ok()?;
    let day = time::Date::from_calendar_date(2000 + yy, month, dd).ok()?;
    let clock = time::Time::from_hms(hh, min, 0).ok()?;
    Some(OffsetDateTime::new_utc(day, clock))
}

/// Directory-derived context a noise file is parsed against.
pub struct NoiseContext<'a> {
    pub site: &'a str,
    pub receiver: &'a str,
    pub rx_loc: &'a str,
    pub band: &'a str,
}

/// Parse the single-line body of a `*_noise.txt` file. The body must
/// contain exactly 15 whitespace-separated tokens; anything else is
/// rejected wholesale (not skipped field-by-field, per §4.5).
pub fn parse_noise_body(
    body: &str,
    time: OffsetDateTime,
    ctx: &NoiseContext<'_>,
) -> Option<NoiseRecord> {
    let line = body.lines().next()?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 15 {
        return None;
    }

    let rms_level: f32 = tokens[12].parse().ok()?;
    let c2_level: f32 = tokens[13].parse().ok()?;
    let ov_raw: f64 = tokens[14].parse().ok()?;
    let ov = clamp_to_i32(ov_raw);

    Some(NoiseRecord {
        time,
        site: ctx.site.to_string(),
        receiver: ctx.receiver.to_string(),
        rx_loc: ctx.rx_loc.to_string(),
        band: ctx.band.to_string(),
        rms_level,
        c2_level,
        ov,
    })
}

fn clamp_to_i32(v: f64) -> i32 {
    let truncated = v.trunc();
    if truncated >= f64::from(i32::MAX) {
        i32::MAX
    } else if truncated <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        truncated as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NoiseContext<'static> {
        NoiseContext {
            site: "W1XYZ",
            receiver: "KA9Q_DXE",
            rx_loc: "FN42",
            band: "20",
        }
    }

    fn fifteen_tokens(rms: &str, c2: &str, ov: &str) -> String {
        let mut tokens = vec!["0.0"; 12];
        let line = format!("{} {rms} {c2} {ov}", tokens.join(" "));
        tokens.clear();
        line
    }

    #[test]
    fn filename_timestamp_parses() {
        let ts = noise_timestamp_from_filename("230615_1200_noise.txt").unwrap();
        assert_eq!(ts.year(), 2023);
        assert_eq!(u8::from(ts.month()), 6);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn malformed_filename_is_rejected() {
        assert!(noise_timestamp_from_filename("not_a_noise_file.txt").is_none());
    }

    #[test]
    fn parses_valid_body() {
        let body = fifteen_tokens("-132.5", "-128.1", "4");
        let ts = noise_timestamp_from_filename("230615_1200_noise.txt").unwrap();
        let rec = parse_noise_body(&body, ts, &ctx()).expect("parses");
        assert_eq!(rec.rms_level, -132.5);
        assert_eq!(rec.c2_level, -128.1);
        assert_eq!(rec.ov, 4);
        assert_eq!(rec.site, "W1XYZ");
        assert_eq!(rec.band, "20");
    }

    #[test]
    fn wrong_token_count_is_rejected() {
        let body = "0.0 0.0 0.0";
        let ts = noise_timestamp_from_filename("230615_1200_noise.txt").unwrap();
        assert!(parse_noise_body(body, ts, &ctx()).is_none());
    }

    #[test]
    fn overload_count_clamps_to_i32_max() {
        let body = fifteen_tokens("-130.0", "-125.0", "3000000000");
        let ts = noise_timestamp_from_filename("230615_1200_noise.txt").unwrap();
        let rec = parse_noise_body(&body, ts, &ctx()).expect("parses");
        assert_eq!(rec.ov, i32::MAX);
    }
}
