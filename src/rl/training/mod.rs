//! Training Infrastructure
//!
//! Training loop, run context and checkpointing.

pub mod checkpointing;
pub mod context;
pub mod trainer;

pub use checkpointing::{episode_name, load_checkpoint, Checkpoint, Checkpointer};
pub use context::{EpsilonSchedule, TrainingContext};
pub use trainer::{summarize_results, EpisodeReport, TrainingLoop, TrainingSummary};
