mod interface;
mod lock;
mod mutex;
#[cfg(test)]
mod tests;

pub use interface::*;
pub use lock::*;
pub(crate) use mutex::*;
