mod aggregator;
mod cancellation;
mod fallback;
mod frame_decoder;
mod jobs;

#[cfg(test)]
mod testing;

pub use aggregator::*;
pub use cancellation::*;
pub use fallback::*;
pub use frame_decoder::*;
pub use jobs::*;
