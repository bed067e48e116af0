//! Optimizers and learning-rate schedules.

mod optimizer;
mod schedule;
mod sgd;

pub use optimizer::Optimizer;
pub use schedule::{LrSchedule, SchedulePolicy};
pub use sgd::{
    decay_eligible, decay_param_groups, ParamGroup, Sgd, SgdState, DEFAULT_WEIGHT_DECAY, MOMENTUM,
};
