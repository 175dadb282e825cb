mod encoder;
mod file_store;

pub use encoder::AvatarEncoder;
pub use file_store::FileAvatarStore;
