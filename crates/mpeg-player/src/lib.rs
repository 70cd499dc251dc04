pub mod config;
pub mod decode;
pub mod device;
pub mod output;
pub mod pcm;
pub mod player;
pub mod resample;

pub use config::PlayerConfig;
pub use player::MpegPlayer;
