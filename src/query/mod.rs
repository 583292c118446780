pub mod filter;
pub mod query_ext;
pub mod temporal;

pub use filter::{CompareOp, Filter};
pub use query_ext::build_query;
pub use temporal::{TimeFilterMethod, TimeRange};
