#![forbid(unsafe_code)]

mod clock;
mod ddl;
mod rows;

pub(super) use clock::*;
pub(super) use ddl::*;
pub(super) use rows::*;
