pub mod avatar;
pub mod fs;
pub mod settings;
pub mod time;

pub use avatar::{AvatarEncoder, FileAvatarStore};
pub use settings::FileSettingsRepository;
pub use time::SystemClock;
