mod check_log;
mod item;
mod list;
mod position;

pub use check_log::CheckLog;
pub use item::{Item, ItemPatch};
pub use list::{List, ListKind};
pub use position::UserListPosition;
