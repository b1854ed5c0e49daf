pub mod db;
pub mod media_server;
pub mod pubsub;
pub mod queue;
pub mod redis;
