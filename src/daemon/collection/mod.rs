pub mod event;
pub mod settle;
pub mod watcher;
