pub mod backup;
pub mod photos;
