mod buffer;
mod clip;

use thiserror::Error;

pub use buffer::RingBuffer;
pub use clip::{Clip, ClipDescriptor, ClipInfo};

#[derive(Debug, Error)]
pub enum RingError {
    #[error("carousel is full ({0} clips)")]
    CapacityExceeded(usize),
    #[error("carousel is empty")]
    EmptyRing,
}
