pub mod heartbeat;

pub use heartbeat::PingWatchdog;
