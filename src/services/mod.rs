pub mod orchestrator;
pub mod poller;
pub mod staging;
pub mod video_host;
pub mod worker;
