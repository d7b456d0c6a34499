#![forbid(unsafe_code)]

mod ledger;
mod reconcile;
mod records;
mod schema;

pub use ledger::*;
pub use reconcile::*;
pub use records::*;
pub use schema::*;
