pub mod hm8115;

pub use hm8115::{HostOs, PortConfig, HM8115};
