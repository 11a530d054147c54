/// File kinds: classification labels and the per-kind statistics index.
pub mod classify;
pub mod index;

pub use classify::{is_package_name, kind_name_for};
pub use index::{KindIndex, KindStatistic, KindSummary};
