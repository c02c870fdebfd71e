use crate::{
    modules::{
        context::Initialize,
        error::{code::ErrorCode, HoldMailResult},
    },
    raise_error,
};

/// Registers the ring provider used by the relay client's TLS connections.
pub struct HoldMailTls;

impl Initialize for HoldMailTls {
    async fn initialize() -> HoldMailResult<()> {
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
            .map_err(|_| {
                raise_error!(
                    "failed to set crypto provider".into(),
                    ErrorCode::InternalError
                )
            })
    }
}

/// Installs the ring provider for tests that reach the relay client. Safe to call from every test.
#[cfg(test)]
pub fn install_test_crypto_provider() {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::ring::default_provider(),
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_install_is_idempotent() {
        install_test_crypto_provider();
        install_test_crypto_provider();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }
}
