//! One query, one accepted reply, over a single upstream connection.
//!
//! Both the plain and the filtered exchange run the same loop: write the
//! query once, then read replies until one passes the [`Acceptance`]
//! check or the fixed deadline runs out. Rejected replies never move the
//! deadline, so a flood of forged answers cannot keep the loop alive.

use std::time::Duration;

use hickory_proto::op::Message;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use super::conn::MessageStream;
use crate::config::FilterMode;
use crate::dns;
use crate::error::UpstreamError;

/// Baseline bound on dialing, writing and reading.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which replies end an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// First reply with the query's transaction ID.
    MatchingId,
    /// Matching ID, checking-disabled set and a non-empty extension
    /// section. Anything else is treated as a probable forgery.
    Marked,
}

impl Acceptance {
    pub fn for_filter(mode: FilterMode) -> Self {
        match mode {
            FilterMode::None | FilterMode::Kernel => Acceptance::MatchingId,
            FilterMode::User => Acceptance::Marked,
        }
    }

    pub fn accepts(self, query: &Message, reply: &Message) -> bool {
        if reply.id() != query.id() {
            return false;
        }
        match self {
            Acceptance::MatchingId => true,
            Acceptance::Marked => dns::carries_marker(reply),
        }
    }
}

/// `start + EXCHANGE_TIMEOUT`, or the caller's deadline if that is sooner.
pub fn deadline(start: Instant, caller: Option<Instant>) -> Instant {
    let baseline = start + EXCHANGE_TIMEOUT;
    match caller {
        Some(caller) if caller < baseline => caller,
        _ => baseline,
    }
}

/// Result of a completed exchange.
#[derive(Debug)]
pub struct Exchanged {
    pub response: Message,
    /// Time from writing the query to reading the accepted reply.
    pub rtt: Duration,
    /// Replies read and rejected before the accepted one.
    pub discarded: usize,
}

/// Send `query` on `stream` and wait for an acceptable reply.
///
/// `deadline` is absolute, normally from [`deadline`] taken before the
/// connection was opened, so dialing and the exchange share one window.
/// Fails on the first write or read error. Running out of time, whether
/// or not rejected replies kept arriving, is [`UpstreamError::Timeout`].
pub async fn exchange<S>(
    stream: &mut S,
    query: &Message,
    acceptance: Acceptance,
    deadline: Instant,
) -> Result<Exchanged, UpstreamError>
where
    S: MessageStream + ?Sized,
{
    let bytes = query.to_vec()?;

    let start = Instant::now();

    timeout_at(deadline, stream.write_msg(&bytes)).await??;

    let mut discarded = 0;
    loop {
        if Instant::now() >= deadline {
            return Err(UpstreamError::Timeout);
        }

        let raw = timeout_at(deadline, stream.read_msg()).await??;

        match Message::from_vec(&raw) {
            Ok(reply) if acceptance.accepts(query, &reply) => {
                return Ok(Exchanged {
                    response: reply,
                    rtt: start.elapsed(),
                    discarded,
                });
            }
            Ok(reply) => {
                debug!(
                    id = reply.id(),
                    expected = query.id(),
                    cd = reply.checking_disabled(),
                    edns = reply.extensions().is_some(),
                    "discarding reply"
                );
            }
            Err(e) => {
                debug!(error = %e, len = raw.len(), "discarding undecodable reply");
            }
        }
        discarded += 1;
    }
}
