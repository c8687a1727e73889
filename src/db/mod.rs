pub mod error;
pub mod user;
pub mod webtoons;
