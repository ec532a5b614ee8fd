pub mod messages;
pub mod transport;

pub use messages::{Request, Response, ResponseBody};
pub use transport::{serve, serve_listener, RequestHandler, RpcClient};
