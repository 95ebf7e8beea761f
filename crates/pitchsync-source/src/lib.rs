//! Paginated source client: HTTP fetch with retry/backoff, cooperative rate
//! pacing, offset pagination, and raw-page archiving.

pub mod archive;
pub mod fetch;
pub mod pacer;
pub mod paginate;
pub mod retry;

pub use archive::{RawPageStore, StoredPage};
pub use fetch::{FetchError, FetchedPage, HttpClientConfig, PageFetcher, VendorAuth};
pub use pacer::RequestPacer;
pub use paginate::{fetch_all, CancelFlag, FetchAllOutcome, PageSource, RawPage, WalkConfig};
pub use retry::{classify_reqwest_error, classify_status, BackoffPolicy, RetryDisposition};

pub const CRATE_NAME: &str = "pitchsync-source";
