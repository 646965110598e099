pub mod context;
pub mod gc;
mod heap;

pub use context::{Context, FunId, NativeFn, VarId};
pub use gc::GcMetrics;
