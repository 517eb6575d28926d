pub mod config;
pub mod core;
pub mod services;
pub mod store;

pub use crate::config::AppConfig;
pub use crate::core::gallery::{GalleryAction, GalleryEffect, GalleryState, reduce};
pub use crate::core::photo::{Photo, PhotoDecision};
pub use crate::store::{Clock, GalleryStore, SystemClock};
