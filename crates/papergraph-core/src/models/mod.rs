pub mod author;
pub mod key;
pub mod paper;
pub mod registry;
pub mod url_pattern;

mod serde_util;

pub use author::*;
pub use key::*;
pub use paper::*;
pub use registry::*;
pub use url_pattern::*;
