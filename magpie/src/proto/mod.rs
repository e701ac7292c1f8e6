//! Wire framing: the XMPP codec and its packet types.

mod codec;

pub use codec::{Frame, Packet, XmppCodec};
