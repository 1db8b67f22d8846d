pub mod client;
pub mod header;
pub mod method;
pub mod probe;
pub mod tls;
pub mod url;

pub use header::Headers;
pub use method::{Method, MethodError};
pub use url::{TargetUrl, UrlError};
