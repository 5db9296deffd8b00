pub mod acquisition;
pub mod combine;
pub mod linelist;
pub mod serialization;
pub mod spectrum;
pub mod split;
pub mod turbo;

mod traits;

pub use traits::{ArchiveFetcher, ExtractionForm, LineListReformatter, Mailbox, PollClock, SystemClock};
