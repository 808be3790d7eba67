//! Maidenhead grid locator <-> latitude/longitude conversion.
//!
//! Convention: a 4-character grid is centered on subsquare index 11 ('ll');
//! a 6-character grid is centered within its own subsquare. Sentinel
//! (-999.0, -999.0) on any invalid input.

const SENTINEL: (f64, f64) = (-999.0, -999.0);

/// Convert a Maidenhead grid square to the (lat, lon) of its center,
/// rounded to 3 decimal places.
#[must_use]
pub fn maidenhead_to_latlon(grid: &str) -> (f64, f64) {
    if grid.len() < 4 {
        return SENTINEL;
    }

    // Field letters are case-folded to uppercase; subsquare letters are
    // conventionally lowercase but folded too, matching the upstream
    // converter's `grid[:2].upper() + grid[2:]` normalization.
    let chars: Vec<char> = grid.chars().collect();
    let field_lon = chars[0].to_ascii_uppercase();
    let field_lat = chars[1].to_ascii_uppercase();
    if !field_lon.is_ascii_alphabetic() || !field_lat.is_ascii_alphabetic() {
        return SENTINEL;
    }

    let Some(square_lon) = chars[2].to_digit(10) else {
        return SENTINEL;
    };
    let Some(square_lat) = chars[3].to_digit(10) else {
        return SENTINEL;
    };

    let mut lon = f64::from(field_lon as u32 - 'A' as u32) * 20.0 - 180.0;
    let mut lat = f64::from(field_lat as u32 - 'A' as u32) * 10.0 - 90.0;
    lon += f64::from(square_lon) * 2.0;
    lat += f64::from(square_lat) * 1.0;

    if chars.len() >= 6 {
        let sub_lon = chars[4].to_ascii_lowercase();
        let sub_lat = chars[5].to_ascii_lowercase();
        if !sub_lon.is_ascii_alphabetic() || !sub_lat.is_ascii_alphabetic() {
            return SENTINEL;
        }
        lon += f64::from(sub_lon as u32 - 'a' as u32) * (2.0 / 24.0);
        lat += f64::from(sub_lat as u32 - 'a' as u32) * (1.0 / 24.0);
        lon += 1.0 / 24.0;
        lat += 0.5 / 24.0;
    } else {
        // Center of the 'll' subsquare (index 11).
        lon += 11.0 * (2.0 / 24.0) + (1.0 / 24.0);
        lat += 11.0 * (1.0 / 24.0) + (0.5 / 24.0);
    }

    (round3(lat), round3(lon))
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Encode a (lat, lon) pair as a 6-character Maidenhead grid. Inverse of
/// [`maidenhead_to_latlon`] for any point actually produced by it — used
/// by the round-trip law in §8.
#[must_use]
pub fn latlon_to_maidenhead(lat: f64, lon: f64) -> String {
    let lon = (lon + 180.0).clamp(0.0, 360.0 - f64::EPSILON);
    let lat = (lat + 90.0).clamp(0.0, 180.0 - f64::EPSILON);

    let field_lon = (lon / 20.0).floor();
    let field_lat = (lat / 10.0).floor();
    let rem_lon = lon - field_lon * 20.0;
    let rem_lat = lat - field_lat * 10.0;

    let square_lon = (rem_lon / 2.0).floor();
    let square_lat = (rem_lat / 1.0).floor();
    let rem_lon = rem_lon - square_lon * 2.0;
    let rem_lat = rem_lat - square_lat * 1.0;

    let sub_lon = (rem_lon / (2.0 / 24.0)).floor();
    let sub_lat = (rem_lat / (1.0 / 24.0)).floor();

    let to_letter = |n: f64, base: u8| (base + n as u8) as char;

    format!(
        "{}{}{}{}{}{}",
        to_letter(field_lon, b'A'),
        to_letter(field_lat, b'A'),
        square_lon as u8,
        square_lat as u8,
        to_letter(sub_lon, b'a'),
        to_letter(sub_lat, b'a'),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_sentinel() {
        assert_eq!(maidenhead_to_latlon(""), (-999.0, -999.0));
        assert_eq!(maidenhead_to_latlon("FN4"), (-999.0, -999.0));
    }

    #[test]
    fn four_char_grid_centers_on_ll() {
        assert_eq!(maidenhead_to_latlon("FN42"), (42.479, -71.042));
    }

    #[test]
    fn six_char_grid_centers_on_subsquare() {
        assert_eq!(maidenhead_to_latlon("FN42ll"), (42.479, -71.042));
    }

    #[test]
    fn six_char_grid_different_subsquare_differs() {
        let (lat, lon) = maidenhead_to_latlon("FN42aa");
        assert_ne!((lat, lon), maidenhead_to_latlon("FN42ll"));
    }

    #[test]
    fn lowercase_field_letters_are_case_folded() {
        assert_eq!(maidenhead_to_latlon("fn42"), maidenhead_to_latlon("FN42"));
    }

    #[test]
    fn six_char_grid_round_trips_through_encode() {
        let (lat, lon) = maidenhead_to_latlon("FN42ll");
        assert_eq!(latlon_to_maidenhead(lat, lon), "FN42ll");
    }
}
