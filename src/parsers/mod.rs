//! Parsing for the bundle's embedded path structure and the spot/noise
//! text formats within.

pub mod noise;
pub mod site;
pub mod spot;

pub use noise::{parse_noise_body, noise_timestamp_from_filename, NoiseContext};
pub use site::{band_str_to_meters, decode_rx_site_dir};
pub use spot::{parse_spot_line, SpotContext};
