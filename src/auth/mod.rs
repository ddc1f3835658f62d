mod claims;
pub(crate) mod extractors;
pub mod password;

pub use extractors::SessionUser;
