//! Monitoring event data structures
//!
//! Defines the Icinga2 notification as it arrives on the event stream, its
//! check state, and the identifiers used to associate it with a ticket.

mod ids;
mod notification;
mod state;

pub use ids::{EventKey, TicketId};
pub use notification::{CheckResult, EventTicket, Notification};
pub use state::{names as state_names, State};
