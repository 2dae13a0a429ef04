mod router;
pub mod views;

pub use router::admin_router;
