mod item;
mod money;
mod register;
mod sale;

pub use item::*;
pub use money::*;
pub use register::*;
pub use sale::*;
