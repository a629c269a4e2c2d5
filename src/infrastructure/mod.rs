pub mod staging;
pub mod video_host;
