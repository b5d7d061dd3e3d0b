pub mod packer;
pub mod system_prompt;
pub mod tokens;
pub mod truncation;

pub use packer::{ContextPacker, PackReport};
pub use system_prompt::{PromptSection, SystemPromptBuilder};
pub use tokens::{CharsOverFour, TokenCounter};
