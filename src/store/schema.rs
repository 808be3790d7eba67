//! Analytic-store row types, matching the ClickHouse DDL in §3/§4.4/§4.5.

use clickhouse::Row;
use serde::Serialize;

/// One decoded WSPR transmission observation.
#[derive(Debug, Clone, Row, Serialize)]
pub struct SpotRecord {
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub time: time::OffsetDateTime,
    pub band: i16,
    pub rx_sign: String,
    pub rx_lat: f32,
    pub rx_lon: f32,
    pub rx_loc: String,
    pub tx_sign: String,
    pub tx_lat: f32,
    pub tx_lon: f32,
    pub tx_loc: String,
    pub distance: i32,
    pub azimuth: f32,
    pub rx_azimuth: f32,
    pub frequency: u64,
    pub power: i8,
    pub snr: i8,
    pub drift: i8,
    pub version: Option<String>,
    pub code: i8,
    pub frequency_mhz: f64,
    pub rx_id: String,
    pub v_lat: f32,
    pub v_lon: f32,
    pub c2_noise: f32,
    pub sync_quality: u16,
    pub dt: f32,
    pub decode_cycles: u32,
    pub jitter: i16,
    pub rms_noise: f32,
    pub blocksize: u16,
    pub metric: i16,
    pub osd_decode: u8,
    pub nhardmin: u16,
    pub ipass: u8,
    pub proxy_upload: u8,
    pub ov_count: u32,
    pub rx_status: String,
    pub band_m: i16,
}

/// Per-minute per-band calibrated noise floor measurement.
#[derive(Debug, Clone, Row, Serialize)]
pub struct NoiseRecord {
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub time: time::OffsetDateTime,
    pub site: String,
    pub receiver: String,
    pub rx_loc: String,
    pub band: String,
    pub rms_level: f32,
    pub c2_level: f32,
    pub ov: i32,
}

/// `CREATE TABLE IF NOT EXISTS` DDL for the spots table, parameterized by
/// database/table name so `--setup-system` and the BatchLoader's staging
/// mode can target either the production or a staging table.
#[must_use]
pub fn create_spots_table_sql(database: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {database}.{table}
        (
            time          DateTime                          CODEC(Delta(4), ZSTD(1)),
            band          Int16                             CODEC(T64, ZSTD(1)),
            rx_sign       LowCardinality(String)            CODEC(LZ4),
            rx_lat        Float32                           CODEC(Delta(4), ZSTD(3)),
            rx_lon        Float32                           CODEC(Delta(4), ZSTD(3)),
            rx_loc        LowCardinality(String)            CODEC(LZ4),
            tx_sign       LowCardinality(String)            CODEC(LZ4),
            tx_lat        Float32                           CODEC(Delta(4), ZSTD(3)),
            tx_lon        Float32                           CODEC(Delta(4), ZSTD(3)),
            tx_loc        LowCardinality(String)            CODEC(LZ4),
            distance      Int32                             CODEC(T64, ZSTD(1)),
            azimuth       Float32                           CODEC(Delta(4), ZSTD(3)),
            rx_azimuth    Float32                           CODEC(Delta(4), ZSTD(3)),
            frequency     UInt64                            CODEC(Delta(8), ZSTD(3)),
            power         Int8                              CODEC(T64, ZSTD(1)),
            snr           Int8                              CODEC(Delta(4), ZSTD(3)),
            drift         Int8                              CODEC(Delta(4), ZSTD(3)),
            version       LowCardinality(Nullable(String))  CODEC(LZ4),
            code          Int8                              CODEC(ZSTD(1)),
            frequency_mhz Float64                           CODEC(Delta(8), ZSTD(3)),
            rx_id         LowCardinality(String)            CODEC(LZ4),
            v_lat         Float32                           CODEC(Delta(4), ZSTD(3)),
            v_lon         Float32                           CODEC(Delta(4), ZSTD(3)),
            c2_noise      Float32                           CODEC(Delta(4), ZSTD(3)),
            sync_quality  UInt16                            CODEC(ZSTD(1)),
            dt            Float32                           CODEC(Delta(4), ZSTD(3)),
            decode_cycles UInt32                            CODEC(T64, ZSTD(1)),
            jitter        Int16                             CODEC(T64, ZSTD(1)),
            rms_noise     Float32                           CODEC(Delta(4), ZSTD(3)),
            blocksize     UInt16                            CODEC(T64, ZSTD(1)),
            metric        Int16                             CODEC(T64, ZSTD(1)),
            osd_decode    UInt8                             CODEC(T64, ZSTD(1)),
            nhardmin      UInt16                            CODEC(T64, ZSTD(1)),
            ipass         UInt8                             CODEC(T64, ZSTD(1)),
            proxy_upload  UInt8                             CODEC(T64, ZSTD(1)),
            ov_count      UInt32                            CODEC(T64, ZSTD(1)),
            rx_status     LowCardinality(String) DEFAULT 'No Info' CODEC(LZ4),
            band_m        Int16                             CODEC(T64, ZSTD(1))
        )
        ENGINE = ReplacingMergeTree()
        PARTITION BY toYYYYMM(time)
        ORDER BY (time, rx_sign, tx_sign, frequency)
        SETTINGS index_granularity = 8192"
    )
}

/// `CREATE TABLE IF NOT EXISTS` DDL for the noise table.
#[must_use]
pub fn create_noise_table_sql(database: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {database}.{table}
        (
            time       DateTime                CODEC(Delta(4), ZSTD(1)),
            site       LowCardinality(String)  CODEC(LZ4),
            receiver   LowCardinality(String)  CODEC(LZ4),
            rx_loc     LowCardinality(String)  CODEC(LZ4),
            band       LowCardinality(String)  CODEC(LZ4),
            rms_level  Float32                 CODEC(Delta(4), ZSTD(3)),
            c2_level   Float32                 CODEC(Delta(4), ZSTD(3)),
            ov         Int32                   CODEC(T64, ZSTD(1))
        )
        ENGINE = ReplacingMergeTree()
        PARTITION BY toYYYYMM(time)
        ORDER BY (time, site, receiver, band)
        SETTINGS index_granularity = 8192"
    )
}
