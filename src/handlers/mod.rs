pub mod health;
pub mod login;
pub mod logout;
pub mod password_reset;
pub mod register;
pub mod users;
pub mod verification;

pub use health::health_check;
pub use login::login;
pub use logout::logout;
pub use password_reset::{request_reset_otp, reset_password};
pub use register::register;
pub use users::{current_user, delete_user};
pub use verification::{send_verify_otp, verify_email};
