pub mod cli;
pub mod config;
pub mod error;
pub mod market;
pub mod rl;

pub use config::{AppConfig, DataConfig, LoggingConfig};
pub use error::{Component, ErrorContext, ExecError, Result};
pub use market::{DataWindow, FeatureAggregator, OrderBookModel, Tick, TickSource, TickStream};
pub use rl::{
    Agent, EvaluationReport, Evaluator, ExecutionEnvironment, LinearQ, RLConfig, ReplayBuffer,
    TrainingLoop, ValueApproximator,
};
