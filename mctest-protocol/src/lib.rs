pub mod codec;
pub mod meta;
pub mod parser;

pub use meta::{MetaInfo, Origin};
