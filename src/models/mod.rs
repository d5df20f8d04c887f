pub mod alert;
pub mod doctor;
pub mod enums;
pub mod medication;
pub mod message;
pub mod notification;
pub mod patient;

pub use alert::*;
pub use doctor::*;
pub use medication::*;
pub use message::*;
pub use notification::*;
pub use patient::*;
