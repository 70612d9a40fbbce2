pub mod health;
pub mod serve;
pub mod watch;
pub mod write;
