pub mod chime;
mod email;
mod throttle;

pub use email::{EmailSettings, Mailer, SmtpMailer};
pub use throttle::SoundThrottle;
