//! Bar feed: data providers and pair alignment.

pub mod align;
pub mod csv_provider;
pub mod provider;
pub mod synthetic;

pub use align::{align_pair, load_pair, AlignedPair};
pub use csv_provider::CsvDirProvider;
pub use provider::{
    bars_from_closes, clean_bars, DataError, DataProvider, DataSource, FetchResult, InMemoryProvider,
};
pub use synthetic::SyntheticProvider;
