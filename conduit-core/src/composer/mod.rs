mod delivery;
mod driver;
pub mod fanout;
pub mod processor;
mod quarantine;
pub mod runner;
pub mod stage;

pub use self::delivery::Sinks;
pub use self::driver::{DriverReport, StreamDriver};
pub use self::fanout::{FanOut, FanOutMode, Upstream};
pub use self::processor::{BatchProcessor, BatchProcessorBuilder};
pub use self::quarantine::QuarantineRouter;
pub use self::runner::PipelineRun;
pub use self::stage::StageOutcome;
