use actix_web::{dev::ServiceRequest, error::ErrorUnauthorized, web, Error, HttpMessage};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;

use crate::state::{AdminCredentials, AppState};

pub const AUTH_REALM: &str = "Studio";

/// The signed-in administrator, available to handlers via `ReqData`.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn authenticate_credentials(
    admin: &AdminCredentials,
    username: &str,
    password: &str,
) -> Option<AuthUser> {
    if username != admin.username || !verify_password(password, &admin.password_hash) {
        return None;
    }
    Some(AuthUser {
        username: username.to_string(),
    })
}

fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    let password = credentials.password().unwrap_or_default();
    authenticate_credentials(&state.admin, credentials.user_id(), password)
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => {
            log::warn!("rejected admin login for {}", credentials.user_id());
            Err((err, req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AdminCredentials {
        AdminCredentials {
            username: "admin".to_string(),
            password_hash: hash_password("secret").unwrap(),
        }
    }

    #[test]
    fn accepts_matching_credentials() {
        let user = authenticate_credentials(&admin(), "admin", "secret").unwrap();
        assert_eq!(user.username, "admin");
    }

    #[test]
    fn rejects_wrong_user_or_password() {
        let admin = admin();
        assert!(authenticate_credentials(&admin, "admin", "nope").is_none());
        assert!(authenticate_credentials(&admin, "root", "secret").is_none());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("secret", "not-a-hash"));
    }
}
