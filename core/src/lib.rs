//! Client core for the webserviceX `GetCitiesByCountry` SOAP operation.
//!
//! # Overview
//! Builds a SOAP 1.2 envelope for a country name, posts it, decodes the
//! response and formats it either as a list of city names or as raw text.
//! The call runs on a background thread behind [`AsyncFetchController`],
//! which hands back exactly one result per `start` and drops results from
//! superseded fetches.
//!
//! # Design
//! - `SoapClient` is host-does-IO: it builds `HttpRequest` values and parses
//!   `HttpResponse` values. Only an `HttpExecutor` touches the network.
//! - `SoapTransport` is the seam the controller depends on, so tests can
//!   script responses without a server.
//! - Every failure (blank query, I/O, bad XML, SOAP fault) ends up as the
//!   same "no data" result at the controller boundary and is only logged.

pub mod client;
pub mod config;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod format;
pub mod http;
pub mod response;
pub mod transport;

pub use client::SoapClient;
pub use config::{ServiceConfig, DEFAULT_ENDPOINT, ENDPOINT_ENV};
pub use controller::{run_fetch, AsyncFetchController, FetchListener, FetchSettings, FetchState};
pub use envelope::{CitiesRequest, RequestEnvelope, SoapRequestBuilder, SoapVersion};
pub use error::{ConfigError, FetchError};
pub use format::{DisplayMode, DisplayResult, ResponseFormatter, NO_DATA_TEXT, TEXT_PREFIX};
pub use http::{HttpExecutor, HttpRequest, HttpResponse, UreqExecutor};
pub use response::{decode_envelope, RawResponse};
pub use transport::{HttpSoapTransport, SoapTransport};
