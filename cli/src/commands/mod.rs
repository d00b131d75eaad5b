pub mod authenticate;
pub mod check;
pub mod config;
