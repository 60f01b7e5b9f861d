//! Request and response models exchanged with the transport.
//!
//! The transport collaborator parses the wire format into a [`Request`] and sends
//! whatever [`Response`] the dispatcher hands back.

pub mod request;
pub mod response;

pub use request::{
    parse_form_data, HeaderVec, Headers, Identity, ParamVec, PathParams, QueryParams, Request,
    RequestId, REQUEST_ID_HEADER,
};
pub use response::{status_reason, BodyStream, Response, ResponseBody};
