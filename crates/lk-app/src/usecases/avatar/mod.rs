//! Local profile picture use cases.

mod load_avatar;
mod remove_avatar;
mod update_avatar;

pub use load_avatar::{AvatarLookup, LoadAvatar};
pub use remove_avatar::RemoveAvatar;
pub use update_avatar::UpdateAvatar;
