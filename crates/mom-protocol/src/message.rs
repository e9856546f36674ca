use crate::event::{Event, EventCode, EventType};
use crate::param::{Param, ParamList};
use crate::status::Status;
use crate::table::lookup_event_code;

/// The single leading byte of every wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    HostGetRequest,
    HostSetRequest,
    HostNotification,
    DeviceReply,
    DeviceNotification,
}

impl Tag {
    pub fn as_char(self) -> char {
        match self {
            Tag::HostGetRequest => '?',
            Tag::HostSetRequest => '&',
            Tag::HostNotification => '%',
            Tag::DeviceReply => ':',
            Tag::DeviceNotification => '!',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(Tag::HostGetRequest),
            '&' => Some(Tag::HostSetRequest),
            '%' => Some(Tag::HostNotification),
            ':' => Some(Tag::DeviceReply),
            '!' => Some(Tag::DeviceNotification),
            _ => None,
        }
    }

    fn event_type(self) -> EventType {
        match self {
            Tag::HostGetRequest => EventType::HOST_GET_REQUEST,
            Tag::HostSetRequest => EventType::HOST_SET_REQUEST,
            Tag::HostNotification => EventType::HOST_NOTIFICATION,
            Tag::DeviceReply => EventType::DEVICE_REPLY,
            Tag::DeviceNotification => EventType::DEVICE_NOTIFICATION,
        }
    }

    fn from_event_type(event_type: EventType) -> Option<Self> {
        if event_type.contains(EventType::DEVICE_REPLY) {
            Some(Tag::DeviceReply)
        } else if event_type.contains(EventType::DEVICE_NOTIFICATION) {
            Some(Tag::DeviceNotification)
        } else {
            None
        }
    }

    fn is_host_request(self) -> bool {
        matches!(self, Tag::HostGetRequest | Tag::HostSetRequest)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub event: Event,
    pub params: ParamList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line was empty; silently dropped, not a protocol error.
    Empty,
    /// The tag byte didn't match any known tag; silently dropped.
    UnknownTag,
    /// Tag parsed but the event name didn't match the table. Carries the
    /// stub error reply for host requests, transmitted verbatim by the
    /// caller; `None` for non-request messages, which have no reply.
    UnknownEventName { error_reply: Option<Vec<u8>> },
}

/// Parse one line (without its trailing CR). See the message-codec design
/// for the full grammar.
pub fn parse_line(line: &str) -> Result<Message, ParseError> {
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut chars = line.chars();
    let tag_char = chars.next().expect("line is non-empty");
    let tag = Tag::from_char(tag_char).ok_or(ParseError::UnknownTag)?;

    let rest = &line[tag_char.len_utf8()..];
    let mut tokens = rest.split(',');
    let name = tokens.next().unwrap_or("");
    let event_type = tag.event_type();

    let code = match lookup_event_code(name) {
        Some(code) => code,
        None => {
            let error_reply = if tag.is_host_request() {
                let n = if matches!(tag, Tag::HostGetRequest) { 0 } else { 1 };
                Some(format!("{}{},{}\r", tag_char, name, n).into_bytes())
            } else {
                None
            };
            return Err(ParseError::UnknownEventName { error_reply });
        }
    };

    let params: ParamList = tokens.filter_map(parse_param_token).collect();

    Ok(Message {
        event: Event::new(code, event_type),
        params,
    })
}

fn parse_param_token(token: &str) -> Option<Param> {
    if token.is_empty() {
        return Some(Param::Null);
    }
    if let Some(inner) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(Param::Str(inner.to_owned()));
    }
    token.parse::<i32>().ok().map(Param::Int)
}

fn format_param(param: &Param) -> String {
    match param {
        Param::Str(s) => format!("'{}'", s),
        Param::Int(v) => v.to_string(),
        Param::Bool(b) => if *b { "1" } else { "0" }.to_owned(),
        Param::Null => String::new(),
    }
}

fn format_message(tag: Tag, name: &str, params: &ParamList) -> Vec<u8> {
    let mut line = format!("{}{}", tag.as_char(), name);
    for param in params.iter() {
        line.push(',');
        line.push_str(&format_param(param));
    }
    line.push('\r');
    line.into_bytes()
}

/// Serialize a DeviceReply or DeviceNotification for a prior request,
/// prepending `status` as parameter 0. Returns `None` if `request`'s type
/// has no defined reply type (i.e. it wasn't a host-originated event).
pub fn serialize_reply(
    request: Event,
    name: &str,
    status: Status,
    mut params: ParamList,
) -> Option<Vec<u8>> {
    let reply_type = request.reply_type()?;
    let tag = Tag::from_event_type(reply_type)?;
    params.prepend(status.code());
    Some(format_message(tag, name, &params))
}

/// Serialize an unprompted DeviceNotification — the form `Controller::notify`
/// uses to push state to peers outside of any request/reply exchange.
/// Unlike `serialize_reply`, no status is prepended: there is no request
/// this notification answers.
pub fn serialize_notification(name: &str, params: &ParamList) -> Vec<u8> {
    format_message(Tag::DeviceNotification, name, params)
}

/// Build the special-cased `edev` reply, whose parameter order is fixed by
/// the external wire contract (status last, not prepended) rather than
/// going through the generic reply path.
pub fn serialize_enumerate_devices(
    solicited: bool,
    device_id: i32,
    device_name: &str,
    model_id: &str,
    serial_number: &str,
    status: Status,
) -> Vec<u8> {
    let tag = if solicited { ':' } else { '!' };
    let status_code = status.code();
    format!(
        "{tag}edev,{device_id},1,'{device_name}','{model_id}',0,'{serial_number}',{status_code}\r"
    )
    .into_bytes()
}
