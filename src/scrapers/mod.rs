pub mod browser;
pub mod collector;
pub mod extract;
pub mod identity;
pub mod pacing;
pub mod price;
pub mod scroll;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use browser::{BrowserCollector, BrowserOptions};
pub use collector::PageCollector;
pub use types::{CollectOptions, SearchParams};
