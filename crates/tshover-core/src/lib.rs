pub mod config;
pub mod hashing;
pub mod markdown;
pub mod shape;
pub mod text;
