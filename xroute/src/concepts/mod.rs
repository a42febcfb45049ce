pub mod export;
pub mod kernel;
pub mod prefix;
pub mod route;
