pub mod email;
pub mod ratings;
pub mod tour_service;

pub use email::{Email, HttpMailer, LogMailer, MailError, Mailer};
pub use tour_service::TourService;
