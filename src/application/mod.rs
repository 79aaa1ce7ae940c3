pub mod fetcher;
pub mod intake;
pub mod ledger;
pub mod orchestrator;
pub mod run_state;

pub use intake::{parse_intake, ParseWarning, ParsedIntake};
pub use ledger::LEDGER_FILE_NAME;
pub use orchestrator::{DownloadOrchestrator, RunEvent, RunHandle};
pub use run_state::DEFAULT_LOG_HISTORY;
