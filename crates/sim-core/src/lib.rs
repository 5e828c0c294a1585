pub mod error;
pub mod prompt;
pub mod traits;
pub mod types;

pub use error::*;
pub use prompt::{build_prompt, extract_prices};
pub use traits::*;
pub use types::*;
