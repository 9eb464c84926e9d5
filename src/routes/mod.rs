pub mod admin;
pub mod donations;
pub mod landing;
pub mod ngo;
pub mod notifications;
pub mod shell;
