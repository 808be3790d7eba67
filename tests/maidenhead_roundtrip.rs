//! §8 round-trip law: for any grid G that encodes a valid Maidenhead
//! square, converting to (lat, lon) and re-encoding the center back to a
//! grid string yields G.

use proptest::prelude::*;
use wsprnet_relay::core::maidenhead::{latlon_to_maidenhead, maidenhead_to_latlon};

fn arbitrary_six_char_grid() -> impl Strategy<Value = String> {
    (0..18u8, 0..18u8, 0..10u8, 0..10u8, 0..24u8, 0..24u8).prop_map(
        |(field_lon, field_lat, square_lon, square_lat, sub_lon, sub_lat)| {
            format!(
                "{}{}{}{}{}{}",
                (b'A' + field_lon) as char,
                (b'A' + field_lat) as char,
                square_lon,
                square_lat,
                (b'a' + sub_lon) as char,
                (b'a' + sub_lat) as char,
            )
        },
    )
}

proptest! {
    #[test]
    fn six_char_grid_round_trips_through_latlon(grid in arbitrary_six_char_grid()) {
        let (lat, lon) = maidenhead_to_latlon(&grid);
        prop_assert_ne!((lat, lon), (-999.0, -999.0));
        let re_encoded = latlon_to_maidenhead(lat, lon);
        prop_assert_eq!(re_encoded, grid);
    }
}

#[test]
fn known_grid_matches_spec_example() {
    assert_eq!(maidenhead_to_latlon("FN42"), (42.479, -71.042));
    assert_eq!(maidenhead_to_latlon("FN42ll"), (42.479, -71.042));
    assert_eq!(maidenhead_to_latlon(""), (-999.0, -999.0));
}
