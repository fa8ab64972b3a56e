/// Mesh radio to Cursor-on-Target bridge library.
///
/// A [`source`] decodes notifications from the mesh radio client into [`source::MeshEvent`]s. The
/// [`dispatch::Dispatcher`] picks out position reports, turns each one into a
/// [`protocol::cot::CotEvent`] and hands the encoded document to a [`transport::CotSink`].
use std::sync::Once;

use thiserror::Error;

pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod source;
pub mod transport;

/// Result type for this library
pub type MCResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt::init();
    });
}
