mod messages;
mod page;
mod route;
mod trip;

pub use self::messages::*;
pub use self::page::*;
pub use self::route::*;
pub use self::trip::*;
