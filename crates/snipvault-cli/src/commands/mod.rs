pub mod init;
pub mod misc;
pub mod pin;
pub mod snippets;
pub mod transfer;
