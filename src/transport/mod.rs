pub mod http;
pub mod link;

pub use http::HttpTransport;
pub use link::link_is_up;
