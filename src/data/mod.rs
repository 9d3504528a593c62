//! External data sources.
//!
//! - `tenv3` parsing/writing (`tenv3`)
//! - station series providers: NGL download and local files (`ngl`, `provider`)
//! - earthquake catalogs: static lists and the USGS event service (`catalog`)
//! - reproducible synthetic series (`synthetic`)

pub mod catalog;
pub mod ngl;
pub mod provider;
pub mod synthetic;
pub mod tenv3;

pub use catalog::*;
pub use ngl::*;
pub use provider::*;
pub use synthetic::*;
pub use tenv3::*;
