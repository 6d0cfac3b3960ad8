pub mod slot;
pub mod types;

pub use slot::InputSlots;
pub use types::{ImageRef, LocalImage, REFETCHED_IMAGE_NAME, decode_data_url, detect_mime};
