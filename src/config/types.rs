use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vidforge_av::tools::EncoderPreference;
use vidforge_av::FfmpegOptions;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Root for the database file and per-video storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Concurrent sessions accepted (0 = unlimited).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Bounds a stalled read or write during a payload transfer.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,

    /// Largest control message accepted.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    2121
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_max_connections() -> usize {
    256
}
fn default_io_timeout() -> u64 {
    30
}
fn default_max_frame_bytes() -> u32 {
    crate::protocol::DEFAULT_MAX_FRAME_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            max_connections: default_max_connections(),
            io_timeout_secs: default_io_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// Location of the SQLite database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("vidforge.db")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// bcrypt work factor for new password hashes.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Items per page for both user and video listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    25
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Renditions encoded at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: f64,

    /// Fraction of the duration at which the thumbnail frame is taken.
    #[serde(default = "default_thumbnail_position")]
    pub thumbnail_position: f64,

    /// `auto`, `none`, or an ffmpeg encoder name.
    #[serde(default = "default_hw_accel")]
    pub hw_accel: String,

    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_secs: u64,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

fn default_workers() -> usize {
    2
}
fn default_segment_duration() -> f64 {
    3.0
}
fn default_thumbnail_position() -> f64 {
    0.3
}
fn default_hw_accel() -> String {
    "auto".to_string()
}
fn default_encode_timeout() -> u64 {
    3600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            segment_duration_secs: default_segment_duration(),
            thumbnail_position: default_thumbnail_position(),
            hw_accel: default_hw_accel(),
            encode_timeout_secs: default_encode_timeout(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl PipelineConfig {
    /// Options for the ffmpeg-backed transcoder.
    pub fn ffmpeg_options(&self) -> FfmpegOptions {
        FfmpegOptions {
            ffmpeg_path: self.ffmpeg_path.clone(),
            ffprobe_path: self.ffprobe_path.clone(),
            encoder: EncoderPreference::from_config(&self.hw_accel),
            encode_timeout: Duration::from_secs(self.encode_timeout_secs),
            ..FfmpegOptions::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// `host:port` of the server.
    #[serde(default = "default_server_addr")]
    pub server: String,

    /// Where fetched segments are kept.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_server_addr() -> String {
    "127.0.0.1:2121".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server_addr(),
            cache_dir: default_cache_dir(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}
