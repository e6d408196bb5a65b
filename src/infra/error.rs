use std::{net::SocketAddr, path::PathBuf};

use thiserror::Error;

/// Failures while wiring the process together: listener, store root, logging.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("store root `{}` is not a directory", root.display())]
    StoreRoot { root: PathBuf },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn store_root(root: impl Into<PathBuf>) -> Self {
        Self::StoreRoot { root: root.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_root_names_the_path() {
        let error = InfraError::store_root("/srv/missing");
        assert_eq!(
            error.to_string(),
            "store root `/srv/missing` is not a directory"
        );
    }

    #[test]
    fn bind_keeps_the_io_source() {
        let addr: SocketAddr = "127.0.0.1:80".parse().expect("valid addr");
        let error = InfraError::bind(
            addr,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(error.to_string().starts_with("failed to bind 127.0.0.1:80"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
