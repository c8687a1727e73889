mod auth;
mod clients;
mod generation;
mod helpers;
mod home;
mod jwt_auth;
mod webtoons;

pub use helpers::AppStateTest;
