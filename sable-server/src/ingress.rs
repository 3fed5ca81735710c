//! Shared connection ingress for the reactor loop and integration-style unit tests.

use sable_common::error::SableResult;
use sable_facade::connection::ConnectionState;

use crate::app::ServerApp;

/// Feeds raw protocol bytes into one connection parser and executes every complete command.
///
/// The returned vector contains one encoded reply buffer per command that became complete after
/// appending `bytes` to this connection's parser state.
///
/// # Errors
///
/// Returns `SableError::Protocol` when the payload violates RESP framing; the caller drops the
/// connection.
pub(crate) fn ingress_connection_bytes(
    app: &mut ServerApp,
    parser: &mut ConnectionState,
    bytes: &[u8],
) -> SableResult<Vec<Vec<u8>>> {
    parser.feed_bytes(bytes);
    let mut responses = Vec::new();
    loop {
        match parser.try_pop_command() {
            Ok(Some(command)) => responses.push(app.execute_command(&command).to_resp_bytes()),
            Ok(None) => break,
            Err(error) => return Err(error),
        }
    }
    Ok(responses)
}
