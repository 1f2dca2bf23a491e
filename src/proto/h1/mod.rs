pub(crate) use self::conn::{Conn, Outcome, ReceivedResponse, ResponseBody};

mod conn;
mod decode;
mod encode;
mod io;
mod role;
