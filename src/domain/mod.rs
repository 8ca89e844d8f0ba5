pub mod claim;
pub mod report;
pub mod swap;
pub mod units;

pub use claim::*;
pub use report::*;
pub use swap::*;
