pub mod heap;
pub mod schema;
pub mod tuple;
pub mod value;

pub use schema::{Column, Schema};
pub use tuple::{Rid, Tuple};
pub use value::{Type, Value};
