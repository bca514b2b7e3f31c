//! Identity extractor for requests arriving through the upstream gateway.
//!
//! Authentication happens before this service: the gateway verifies the
//! caller and injects trusted `X-Auth-*` headers. The extractor only parses
//! them and enforces role gates.

use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};
use strum::EnumString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Hr,
    Employee,
    System,
    ApiUser,
}

pub struct AuthEmployee {
    pub user_id: u64,
    pub company_id: u64,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

fn header<'r>(req: &'r HttpRequest, name: &str) -> Option<&'r str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

impl FromRequest for AuthEmployee {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user_id = match header(req, "X-Auth-User-Id").and_then(|v| v.parse().ok()) {
            Some(id) => id,
            None => return ready(Err(ErrorUnauthorized("Missing identity"))),
        };

        let company_id = match header(req, "X-Auth-Company-Id").and_then(|v| v.parse().ok()) {
            Some(id) => id,
            None => return ready(Err(ErrorUnauthorized("Missing company"))),
        };

        let role = match header(req, "X-Auth-Role").and_then(|v| v.parse::<Role>().ok()) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        let employee_id = header(req, "X-Auth-Employee-Id").and_then(|v| v.parse().ok());

        ready(Ok(AuthEmployee {
            user_id,
            company_id,
            role,
            employee_id,
        }))
    }
}

impl AuthEmployee {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    /// The employee this request acts as, for clock operations.
    pub fn employee_id(&self) -> actix_web::Result<u64> {
        self.employee_id
            .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))
    }
}
