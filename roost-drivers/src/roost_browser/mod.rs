pub mod driver;
pub mod fingerprint;
pub mod process;
pub mod stealth;
