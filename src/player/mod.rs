// 播放器模块
// 导出队列、引擎与播放服务

mod engine;
mod manager;
mod output;
mod queue;
mod types;

pub use engine::{LoadTicket, PlaybackEngine, ResolutionOutcome};
pub use manager::{PlayerEvent, PlayerService};
pub use output::{MediaEvent, MediaOutput, NullOutput};
pub use queue::{QueueManager, QueueTransition, RESTART_THRESHOLD_SECS};
pub use types::*;
