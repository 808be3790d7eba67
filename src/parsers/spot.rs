//! Spot-line parser: 34+ whitespace-delimited fields per line of a
//! `*_spots.txt` file.

use crate::store::schema::SpotRecord;
use time::OffsetDateTime;

/// Directory-derived context a spot line is parsed against: everything the
/// bundle's path (not the line itself) tells us.
pub struct SpotContext<'a> {
    pub rx_id: &'a str,
    pub dir_rx_sign: &'a str,
    pub dir_rx_loc: &'a str,
    pub band_m: i32,
    pub client_version: Option<&'a str>,
}

/// Parse one line of a `*_spots.txt` file. Returns `None` (and the caller
/// logs at debug) when the line has fewer than 34 tokens or any field
/// fails to parse — a malformed line never aborts the rest of the file.
pub fn parse_spot_line(line: &str, ctx: &SpotContext<'_>) -> Option<SpotRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 34 {
        return None;
    }

    let date = tokens[0];
    let time_s = tokens[1];
    let sync_quality = parse_f64(tokens[2])?;
    let snr = int_of_float(tokens[3])?;
    let dt = parse_f32(tokens[4])?;
    let freq_mhz = parse_f64(tokens[5])?;
    let tx_sign = tokens[6].to_string();
    let tx_loc = none_literal(tokens[7]);
    let power_dbm = int_of_float(tokens[8])?;
    let drift = int_of_float(tokens[9])?;
    let decode_cycles = int_of_float(tokens[10])?;
    let jitter = int_of_float(tokens[11])?;
    let blocksize = int_of_float(tokens[12])?;
    let metric = int_of_float(tokens[13])?;
    let osd_decode = int_of_float(tokens[14])?;
    let ipass = int_of_float(tokens[15])?;
    let nhardmin = int_of_float(tokens[16])?;
    let code = int_of_float(tokens[17])?;
    let rms_noise = parse_f32(tokens[18])?;
    let c2_noise = parse_f32(tokens[19])?;
    let band_m_file = int_of_float(tokens[20])?;
    let file_rx_loc = none_literal(tokens[21]);
    let file_rx_sign = tokens[22];
    let distance = int_of_float(tokens[23])?;
    let rx_azimuth = parse_f32(tokens[24])?;
    let rx_lat = parse_f32(tokens[25])?;
    let rx_lon = parse_f32(tokens[26])?;
    let azimuth = parse_f32(tokens[27])?;
    let tx_lat = parse_f32(tokens[28])?;
    let tx_lon = parse_f32(tokens[29])?;
    let v_lat = parse_f32(tokens[30])?;
    let v_lon = parse_f32(tokens[31])?;
    let ov_count = int_of_float(tokens[32])?;
    let proxy_upload = int_of_float(tokens[33])?;

    let time = spot_timestamp(date, time_s)?;

    // Field 22 is authoritative for rx_sign; field 21 is authoritative
    // unless empty, in which case the directory-derived grid is used.
    let rx_sign = if file_rx_sign.is_empty() {
        ctx.dir_rx_sign.to_string()
    } else {
        file_rx_sign.to_string()
    };
    let rx_loc = if file_rx_loc.is_empty() {
        ctx.dir_rx_loc.to_string()
    } else {
        file_rx_loc
    };

    Some(SpotRecord {
        time,
        band: i16::try_from(ctx.band_m).ok()?,
        rx_sign,
        rx_lat,
        rx_lon,
        rx_loc,
        tx_sign,
        tx_lat,
        tx_lon,
        tx_loc,
        distance,
        azimuth,
        rx_azimuth,
        frequency: (freq_mhz * 1_000_000.0).round() as u64,
        power: power_dbm as i8,
        snr: snr as i8,
        drift: drift as i8,
        version: ctx.client_version.map(str::to_string),
        code: code as i8,
        frequency_mhz: freq_mhz,
        rx_id: ctx.rx_id.to_string(),
        v_lat,
        v_lon,
        c2_noise,
        sync_quality: sync_quality.max(0.0) as u16,
        dt,
        decode_cycles: decode_cycles.max(0) as u32,
        jitter: jitter as i16,
        rms_noise,
        blocksize: blocksize.max(0) as u16,
        metric: metric as i16,
        osd_decode: osd_decode as u8,
        nhardmin: nhardmin.max(0) as u16,
        ipass: ipass as u8,
        proxy_upload: proxy_upload as u8,
        ov_count: ov_count.max(0) as u32,
        rx_status: "No Info".to_string(),
        band_m: band_m_file as i16,
    })
}

fn spot_timestamp(date: &str, time_s: &str) -> Option<OffsetDateTime> {
    if date.len() != 6 || time_s.len() != 4 {
        return None;
    }
    let yy: i32 = date[0..2].parse().ok()?;
    let mm: u8 = date[2..4].parse().ok()?;
    let dd: u8 = date[4..6].parse().ok()?;
    let hh: u8 = time_s[0..2].parse().ok()?;
    let min: u8 = time_s[2..4].parse().ok()?;

    let month = time::Month::try_from(mm).ok()?;
    let date = time::Date::from_calendar_date(2000 + yy, month, dd).ok()?;
    let time = time::Time::from_hms(hh, min, 0).ok()?;
    Some(OffsetDateTime::new_utc(date, time))
}

/// Python's `int(float(x))`: parse as float, truncate toward zero.
fn int_of_float(s: &str) -> Option<i64> {
    s.parse::<f64>().ok().map(|v| v.trunc() as i64)
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse().ok()
}

fn parse_f32(s: &str) -> Option<f32> {
    s.parse().ok()
}

fn none_literal(s: &str) -> String {
    if s.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> String {
        // 34 whitespace-separated tokens matching the table in §4.4.
        [
            "230615", "1200", "23.0", "-12", "0.2", "14.097100", "K1AA", "FN42", "37", "0", "1",
            "2", "1024", "10", "0", "1", "30", "0", "-25.3", "-26.1", "20", "FN42", "W1XYZ",
            "1200", "90.0", "42.479", "-71.042", "90.0", "42.0", "-71.0", "42.4", "-71.1", "0",
            "0",
        ]
        .join(" ")
    }

    fn ctx() -> SpotContext<'static> {
        SpotContext {
            rx_id: "KA9Q_DXE",
            dir_rx_sign: "W1XYZ",
            dir_rx_loc: "FN42",
            band_m: 20,
            client_version: Some("4.1.7"),
        }
    }

    #[test]
    fn parses_full_line() {
        let rec = parse_spot_line(&sample_line(), &ctx()).expect("parses");
        assert_eq!(rec.frequency, 14_097_100);
        assert!((rec.frequency_mhz - 14.0971).abs() < 1e-6);
        assert_eq!(rec.tx_sign, "K1AA");
        assert_eq!(rec.rx_loc, "FN42");
        assert_eq!(rec.rx_sign, "W1XYZ");
        assert_eq!(rec.rx_status, "No Info");
    }

    #[test]
    fn line_with_33_tokens_is_rejected() {
        let short: Vec<&str> = sample_line().split_whitespace().take(33).collect();
        assert!(parse_spot_line(&short.join(" "), &ctx()).is_none());
    }

    #[test]
    fn extra_trailing_tokens_are_ignored() {
        let extended = format!("{} extra garbage", sample_line());
        assert!(parse_spot_line(&extended, &ctx()).is_some());
    }

    #[test]
    fn none_rx_loc_falls_back_to_directory() {
        let mut tokens: Vec<&str> = sample_line().split_whitespace().collect();
        tokens[21] = "none";
        let rec = parse_spot_line(&tokens.join(" "), &ctx()).expect("parses");
        assert_eq!(rec.rx_loc, "FN42");
    }
}
