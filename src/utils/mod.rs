mod task;
pub(crate) use task::*;
