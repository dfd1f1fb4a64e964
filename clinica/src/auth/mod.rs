//! Authentication and authorization.
//!
//! The system supports two login paths that both end in the same session
//! artifact, a signed HTTP-only cookie:
//!
//! - **Native login**: username/password checked against the users table
//!   (`POST /api/auth`). Passwords are stored as salted Argon2id hashes.
//! - **External login**: the Google OAuth redirect dance
//!   (`/login/google-login` → `/login/google-response`), mapping the
//!   provider's stable subject to a local user.
//!
//! Authorization is role-based: handlers take the [`current_user::CurrentUser`]
//! extractor for "any authenticated caller" or
//! [`current_user::RequiresAdmin`] for admin-only routes.
//!
//! # Modules
//!
//! - [`current_user`]: extractors and the sliding-renewal middleware
//! - [`oauth`]: external identity provider client (authorize URL, code
//!   exchange, userinfo)
//! - [`password`]: password hashing and verification using Argon2
//! - [`session`]: session token creation/verification and cookie helpers

pub mod current_user;
pub mod oauth;
pub mod password;
pub mod session;
