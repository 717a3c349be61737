/*
    core_router - everything that crosses a store boundary

    - message: the wire schema
    - transport: peer handles and the outbound collaborator trait
    - attachments: prefix -> peer routing
    - pending: correlation of forwarded gets with their answers
    - local_transport / channel_transport: transports shipped with the crate
*/

pub mod attachments;
pub mod channel_transport;
pub mod local_transport;
pub mod message;
pub mod pending;
pub mod transport;

pub use attachments::{AttachmentTable, Route};
pub use channel_transport::ChannelTransport;
pub use local_transport::LocalNetwork;
pub use message::{Message, MessageKind};
pub use pending::{PendingRequests, RemoteResult};
pub use transport::{Envelope, PeerId, Transport, TransportError};
