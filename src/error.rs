use std::fmt;

use thiserror::Error;

/// Component that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    TickStream,
    FeatureAggregator,
    OrderBook,
    Environment,
    ReplayBuffer,
    Agent,
    TrainingLoop,
    Evaluator,
    Config,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::TickStream => "tick_stream",
            Component::FeatureAggregator => "feature_aggregator",
            Component::OrderBook => "order_book",
            Component::Environment => "environment",
            Component::ReplayBuffer => "replay_buffer",
            Component::Agent => "agent",
            Component::TrainingLoop => "training_loop",
            Component::Evaluator => "evaluator",
            Component::Config => "config",
        };
        f.write_str(name)
    }
}

/// Where an error happened: episode, step index and component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub episode_id: Option<u64>,
    pub step: Option<u64>,
    pub component: Component,
}

impl ErrorContext {
    pub fn new(component: Component) -> Self {
        Self {
            episode_id: None,
            step: None,
            component,
        }
    }

    pub fn episode(mut self, episode_id: u64) -> Self {
        self.episode_id = Some(episode_id);
        self
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component={}", self.component)?;
        if let Some(id) = self.episode_id {
            write!(f, " episode={id}")?;
        }
        if let Some(step) = self.step {
            write!(f, " step={step}")?;
        }
        Ok(())
    }
}

/// Main error type for the execution environment and training stack
#[derive(Error, Debug)]
pub enum ExecError {
    // Data source errors
    #[error("IO error [{context}]: {message}")]
    Io {
        context: ErrorContext,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Invalid episode or run parameters
    #[error("Configuration error [{context}]: {message}")]
    Config {
        context: ErrorContext,
        message: String,
    },

    // Operation on a terminated episode, or step before reset
    #[error("State error [{context}]: {message}")]
    State {
        context: ErrorContext,
        message: String,
    },

    #[error("Insufficient data [{context}]: requested {requested}, available {available}")]
    InsufficientData {
        context: ErrorContext,
        requested: usize,
        available: usize,
    },

    // NaN/inf in a state vector or loss
    #[error("Numeric instability [{context}]: {message}")]
    NumericInstability {
        context: ErrorContext,
        message: String,
    },

    #[error("Config loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// Result type alias for ExecError
pub type Result<T> = std::result::Result<T, ExecError>;

impl ExecError {
    pub fn io(context: ErrorContext, message: impl Into<String>, source: std::io::Error) -> Self {
        ExecError::Io {
            context,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Data problem without an underlying I/O error (empty window, bad checkpoint)
    pub fn data(context: ErrorContext, message: impl Into<String>) -> Self {
        ExecError::Io {
            context,
            message: message.into(),
            source: None,
        }
    }

    pub fn config(context: ErrorContext, message: impl Into<String>) -> Self {
        ExecError::Config {
            context,
            message: message.into(),
        }
    }

    pub fn state(context: ErrorContext, message: impl Into<String>) -> Self {
        ExecError::State {
            context,
            message: message.into(),
        }
    }

    pub fn numeric(context: ErrorContext, message: impl Into<String>) -> Self {
        ExecError::NumericInstability {
            context,
            message: message.into(),
        }
    }

    /// Context of domain errors; wrapper variants carry none
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ExecError::Io { context, .. }
            | ExecError::Config { context, .. }
            | ExecError::State { context, .. }
            | ExecError::InsufficientData { context, .. }
            | ExecError::NumericInstability { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Caller may wait or skip and try again later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExecError::InsufficientData { .. })
    }

    /// The training run cannot continue and must be restarted
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, ExecError::NumericInstability { .. })
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, ExecError::Config { .. } | ExecError::ConfigLoad(_))
    }

    pub fn is_data_error(&self) -> bool {
        matches!(self, ExecError::Io { .. } | ExecError::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new(Component::Environment).episode(7).step(12);
        assert_eq!(ctx.to_string(), "component=environment episode=7 step=12");
    }

    #[test]
    fn test_error_message_identifies_location() {
        let err = ExecError::state(
            ErrorContext::new(Component::Environment).episode(3).step(50),
            "step called on terminated episode",
        );
        let msg = err.to_string();
        assert!(msg.contains("episode=3"));
        assert!(msg.contains("step=50"));
        assert!(msg.contains("environment"));
    }

    #[test]
    fn test_classification() {
        let insufficient = ExecError::InsufficientData {
            context: ErrorContext::new(Component::ReplayBuffer),
            requested: 32,
            available: 4,
        };
        assert!(insufficient.is_recoverable());
        assert!(!insufficient.is_fatal_to_run());

        let numeric = ExecError::numeric(ErrorContext::new(Component::Agent).step(9), "loss is NaN");
        assert!(numeric.is_fatal_to_run());
        assert_eq!(numeric.context().and_then(|c| c.step), Some(9));
    }
}
