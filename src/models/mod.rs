mod donation;
mod request;
mod testimonial;
mod user;

pub use donation::Donation;
pub use request::HelpRequest;
pub use testimonial::{Testimonial, TestimonialStatus};
pub use user::{AccountStatus, ProfileView, Role, UserAccount};
