//! Borrowed image views used to assemble per-pixel features.
pub mod traits;
pub mod u8;

pub use self::traits::{ImageView, Rows};
pub use self::u8::ImageU8;
