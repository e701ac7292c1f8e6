//! Provided client mechanisms.

mod plain;
#[cfg(feature = "scram")]
mod scram;

pub use self::plain::Plain;
#[cfg(feature = "scram")]
pub use self::scram::Scram;
