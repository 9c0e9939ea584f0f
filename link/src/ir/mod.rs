pub mod function;
pub mod module;
pub mod parser;
pub mod printer;
pub mod types;

pub use function::*;
pub use module::*;
pub use parser::*;
pub use printer::*;
pub use types::*;
