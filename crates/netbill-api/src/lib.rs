// netbill-api: Async client for the router binary API (PPP secret management)

pub mod client;
pub mod codec;
pub mod error;
pub mod sentence;
pub mod session;
pub mod transport;

pub use client::{
    ActiveConnection, ConnectionTest, DEFAULT_PORT, NewSecret, RouterClient, RouterEndpoint,
    SecretChange,
};
pub use error::Error;
pub use sentence::{Reply, ReplyKind, Sentence};
pub use session::Session;
pub use transport::TransportConfig;
