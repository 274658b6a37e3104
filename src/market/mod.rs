//! Market data: tick streaming, rolling features and the simplified book

pub mod book;
pub mod features;
pub mod stream;
pub mod synthetic;
pub mod tick;

pub use book::{
    BookPhase, BookSnapshot, ChildOrder, ChildOrderKind, DepthBucket, FillOutcome, OrderBookModel,
};
pub use features::{AggregatedFeatures, FeatureAggregator, RollingWindow};
pub use stream::{DataWindow, TickFormat, TickSource, TickStream};
pub use synthetic::{generate_ticks, write_tick_file, SyntheticConfig};
pub use tick::{EventType, Side, Tick};
