//! Concrete CPU backends
//!
//! Plain types with compile-time dispatch; no boxing.

pub mod avx2;
pub mod scalar;

pub use avx2::Avx2Backend;
pub use scalar::ScalarBackend;
