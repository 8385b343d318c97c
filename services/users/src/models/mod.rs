//! User service models

pub mod role;
pub mod user;

pub use role::Role;
pub use user::{
    LoginRequest, LoginResponse, NewUser, RefreshRequest, RegisterRequest, TokenPair, User,
    UserProfile, UserSummary,
};
