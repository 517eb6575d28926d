pub mod deletion;
pub mod media;
pub mod permissions;
pub mod storage;
