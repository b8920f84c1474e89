pub mod convert;
pub mod install;
pub mod locate;
pub mod platform;
pub mod serve;
