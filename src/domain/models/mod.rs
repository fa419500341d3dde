mod action;
mod backend;
mod error;
mod event;
mod frame;
mod output_format;
mod request;
mod session;
mod snapshot;

pub use action::*;
pub use backend::*;
pub use error::*;
pub use event::*;
pub use frame::*;
pub use output_format::*;
pub use request::*;
pub use session::*;
pub use snapshot::*;
