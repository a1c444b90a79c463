mod connection_optimizer;
mod leader_timer;
mod sending_optimizer;

pub use connection_optimizer::{ConnectionOptimizer, OptimizerAction};
pub use leader_timer::LeaderTimer;
pub use sending_optimizer::SendingOptimizer;
