mod inbox;

pub use inbox::RequestInbox;
