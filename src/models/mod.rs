pub mod descriptor;
pub mod outbound;
pub mod pool;

pub use descriptor::*;
pub use outbound::*;
pub use pool::*;
