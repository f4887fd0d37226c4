/*!
The binary protocol (major version 0, minor 11) of the EdgeDB server.

The [Value](crate::value::Value) enum is the quickest overview of the data
model; everything else is the wire machinery: client and server message
catalogues, the type-descriptor parser, and the codec trees derived from
descriptors that encode query arguments and decode result rows.
*/

pub mod client_message;
pub mod codec;
pub mod descriptors;
pub mod encoding;
pub mod error_response;
pub mod errors;
pub mod features;
pub mod serialization;
pub mod server_message;
pub mod value;

pub mod bignum;
pub mod range;
pub mod time;
