pub mod app_data_dir;
mod atomic;

pub use app_data_dir::{app_data_dir, avatar_path, settings_path};
pub use atomic::atomic_write;
