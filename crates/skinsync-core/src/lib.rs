pub mod config;
pub mod logging;

pub mod http;
pub mod image;
pub mod skins;
pub mod storage;
