pub mod download_engine;
pub mod ledger;
pub mod resolver;
pub mod session;

pub use download_engine::{DownloadEngine, LectureFetcher, StreamDownloader, YtDlp};
pub use ledger::{DownloadLedger, LedgerCourse, LedgerDocument, LedgerEntry, LEDGER_FILE};
pub use resolver::{LectureResolver, ResolveError};
pub use session::{Session, SessionState, RETRY_LIMIT};
