//! Domain services over a [`RecordStore`](crate::store::RecordStore).

pub mod appointments;
pub mod catalog;
pub mod collection;
pub mod content;
pub mod media;
pub mod messages;
pub mod payments;

use std::fmt;
use std::str::FromStr;

pub use appointments::AppointmentService;
pub use catalog::BlogService;
pub use collection::Collection;
pub use content::SiteContentService;
pub use media::{MediaGalleryService, UploadService};
pub use messages::ContactMessageService;
pub use payments::PaymentService;

/// How status changes are checked.
///
/// `Open` accepts any target status. `Strict` consults the lifecycle tables
/// on [`AppointmentStatus`](crate::models::AppointmentStatus) and
/// [`PaymentStatus`](crate::models::PaymentStatus) and costs one extra read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    #[default]
    Open,
    Strict,
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusPolicy::Open => "open",
            StatusPolicy::Strict => "strict",
        })
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(StatusPolicy::Open),
            "strict" => Ok(StatusPolicy::Strict),
            other => Err(format!("unknown status policy `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Strict".parse::<StatusPolicy>(), Ok(StatusPolicy::Strict));
        assert_eq!(" open ".parse::<StatusPolicy>(), Ok(StatusPolicy::Open));
        assert!("lenient".parse::<StatusPolicy>().is_err());
    }
}
