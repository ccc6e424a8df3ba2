//! DNS message helpers.
//!
//! Wire encoding lives in `hickory-proto`; this module holds the few
//! message-level rules the proxy applies on top of it.

use hickory_proto::op::{Edns, Message, MessageType, ResponseCode};

/// Smallest UDP payload every DNS implementation must accept.
pub const MIN_MSG_SIZE: u16 = 512;

/// Payload size advertised in the EDNS record of marked queries.
pub const MARKER_PAYLOAD_SIZE: u16 = 4096;

/// Cache identity of a query.
///
/// Built from the case-folded question name, type and class. The
/// transaction ID and any EDNS state are deliberately left out, so two
/// queries for the same question share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    name: String,
    qtype: u16,
    qclass: u16,
}

impl Fingerprint {
    /// Fingerprint of the first question in `message`, if it has one.
    pub fn of(message: &Message) -> Option<Self> {
        let query = message.queries().first()?;

        Some(Self {
            name: query.name().to_lowercase().to_string(),
            qtype: query.query_type().into(),
            qclass: query.query_class().into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qtype(&self) -> u16 {
        self.qtype
    }

    pub fn qclass(&self) -> u16 {
        self.qclass
    }
}

/// Apply the anti-spoof marker to an outgoing query.
///
/// Sets checking-disabled and replaces the additional section with a
/// single large EDNS record, the way a BIND resolver would send it.
/// Genuine recursive resolvers echo both back.
pub fn mark_query(query: &mut Message) {
    query.set_checking_disabled(true);
    query.take_additionals();

    let mut edns = Edns::new();
    edns.set_max_payload(MARKER_PAYLOAD_SIZE);
    edns.set_dnssec_ok(true);
    query.set_edns(edns);
}

/// Whether a reply carries the marker a genuine resolver mirrors back.
pub fn carries_marker(reply: &Message) -> bool {
    reply.checking_disabled() && (reply.extensions().is_some() || !reply.additionals().is_empty())
}

/// UDP payload size to use when talking to an upstream about `query`.
///
/// The query's own EDNS size wins when it is at least the protocol
/// minimum; otherwise the client default applies.
pub fn udp_payload_size(query: &Message, client_default: u16) -> u16 {
    match query.extensions() {
        Some(edns) if edns.max_payload() >= MIN_MSG_SIZE => edns.max_payload(),
        _ => client_default.max(MIN_MSG_SIZE),
    }
}

/// Build an empty response to `query` carrying `code`.
///
/// Echoes the ID, opcode, question and the RD/CD flags.
pub fn error_response(query: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_recursion_desired(query.recursion_desired())
        .set_checking_disabled(query.checking_disabled())
        .set_response_code(code);
    response.add_queries(query.queries().iter().cloned());
    response
}

/// SERVFAIL response to `query`.
pub fn servfail(query: &Message) -> Message {
    error_response(query, ResponseCode::ServFail)
}
