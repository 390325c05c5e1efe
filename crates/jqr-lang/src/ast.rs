use smol_str::SmolStr;

use crate::Shared;

pub mod error;
pub mod node;
pub mod parser;

pub type IdentName = SmolStr;
pub type Program = Shared<node::Node>;
