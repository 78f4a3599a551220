// This file is part of nova64.

mod irq_line;
mod observer;
mod shared;

pub use self::irq_line::IrqLine;
pub use self::observer::{Event, Observers};
pub use self::shared::{new_shared, Shared};
