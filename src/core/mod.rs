pub mod achievements;
pub mod analysis;
pub mod filters;
pub mod gallery;
pub mod photo;
