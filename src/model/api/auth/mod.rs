mod request;
mod token;
mod user;

pub use request::{
    validate_email, validate_password, AuthResponse, CredentialsError, LoginRequest,
    RegisterRequest, UserProfile, MIN_PASSWORD_LENGTH,
};
pub use token::{AuthToken, AUTH_HEADER};
pub use user::{Admin, Rights, Role, Voter};
