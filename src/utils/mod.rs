/// Utility modules for common functionality
pub mod audio;
pub mod datetime;
pub mod fs;
pub mod messages;
pub mod translations;
