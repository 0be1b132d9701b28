//! Blocking SOAP transport: build, execute, decode.

use crate::client::SoapClient;
use crate::envelope::RequestEnvelope;
use crate::error::FetchError;
use crate::http::{HttpExecutor, UreqExecutor};
use crate::response::RawResponse;

/// Sends one envelope and blocks until the decoded response (or failure)
/// is available. Must not be called from a thread that has to stay
/// responsive.
pub trait SoapTransport: Send + Sync {
    fn send(
        &self,
        envelope: &RequestEnvelope,
        endpoint: &str,
        action: &str,
    ) -> Result<Option<RawResponse>, FetchError>;
}

/// SOAP over HTTP through an [`HttpExecutor`].
#[derive(Clone, Default)]
pub struct HttpSoapTransport<E = UreqExecutor> {
    executor: E,
}

impl<E: HttpExecutor> HttpSoapTransport<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: HttpExecutor> SoapTransport for HttpSoapTransport<E> {
    fn send(
        &self,
        envelope: &RequestEnvelope,
        endpoint: &str,
        action: &str,
    ) -> Result<Option<RawResponse>, FetchError> {
        let client = SoapClient::new(endpoint);
        let request = client.build_call(envelope, action)?;
        tracing::debug!(endpoint, action, bytes = request.body.len(), "Sending SOAP request");

        let response = self.executor.execute(request)?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "SOAP response received");

        client.parse_call(response)
    }
}
