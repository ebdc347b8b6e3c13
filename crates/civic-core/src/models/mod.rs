//! Data models for Civic

mod address;
mod appointment;
mod favorite;
mod info;
mod office;
mod settings;
mod ticket;
mod user;

pub use address::{AddressEntry, AddressKind, AddressSuggestion};
pub use appointment::{Appointment, AppointmentNote, NewAppointment};
pub use favorite::{FavoriteMark, FavoriteType, Favorited};
pub use info::Info;
pub use office::Office;
pub use settings::NotificationSettings;
pub use ticket::{DraftInput, MyTicket, NewTicket, Ticket, TicketDraft};
pub use user::{Credentials, Session, UserProfile};
