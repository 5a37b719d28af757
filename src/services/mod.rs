pub mod auth;
pub mod email;
pub mod otp;
pub mod password_reset;
pub mod session;
pub mod verification;

pub use email::EmailService;
pub use password_reset::PasswordResetService;
pub use session::SessionService;
pub use verification::EmailVerificationService;
