//! Wire format for the MOM control-surface protocol: a textual, CR-terminated,
//! comma-separated line protocol carried over UDP discovery and a TCP control
//! session. This crate owns parsing and serialization only; it knows nothing
//! about sockets, peers, or dispatch.

mod event;
mod message;
mod param;
mod status;
mod table;

pub use event::{Event, EventCode, EventType};
pub use message::{
    Message, ParseError, Tag, parse_line, serialize_enumerate_devices, serialize_notification,
    serialize_reply,
};
pub use param::{Param, ParamList};
pub use status::Status;
pub use table::{MAX_EVENT_NAME_LEN, event_name, lookup_event_code, valid_types_for};
