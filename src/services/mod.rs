pub mod price_feed;
pub mod registry;
pub mod strategies;
pub mod submission;
pub mod watcher;
