pub mod portal;
pub mod util;

pub use portal::PortalClient;
