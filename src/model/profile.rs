use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a locally edited profile is rejected before it reaches the cache.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Church name is required")]
    MissingName,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Invalid website URL format")]
    InvalidWebsite,
    #[error("Invalid phone number format")]
    InvalidPhone,
}

/// The singleton profile record from the profile tab.
///
/// Only one instance is ever cached; every write replaces it whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurchProfile {
    pub name: String,
    pub logo_url: String,
    pub welcome_message: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub email: String,
    pub mission: String,
    pub service_times: String,
    pub social_link: String,
}

impl ChurchProfile {
    /// Check required fields and the format of optional contact fields.
    ///
    /// Blank optional fields are accepted; only filled ones are checked.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::MissingName);
        }
        if !self.email.is_empty() && !is_valid_email(&self.email) {
            return Err(ProfileError::InvalidEmail);
        }
        if !self.website.is_empty() && !is_valid_website(&self.website) {
            return Err(ProfileError::InvalidWebsite);
        }
        if !self.phone.is_empty() && !self.phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(ProfileError::InvalidPhone);
        }
        Ok(())
    }

    /// Name, address and phone are all filled in.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.address.trim().is_empty()
            && !self.phone.trim().is_empty()
    }

    /// Share of non-blank fields, 0-100.
    pub fn completeness_percent(&self) -> u8 {
        let fields = self.fields();
        let filled = fields.iter().filter(|f| !f.trim().is_empty()).count();
        (filled * 100 / fields.len()) as u8
    }

    fn fields(&self) -> [&str; 10] {
        [
            &self.name,
            &self.logo_url,
            &self.welcome_message,
            &self.address,
            &self.phone,
            &self.website,
            &self.email,
            &self.mission,
            &self.service_times,
            &self.social_link,
        ]
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+_.-".contains(c));
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());
    local_ok && host_ok && tld_ok
}

fn is_valid_website(website: &str) -> bool {
    website.starts_with("http://") || website.starts_with("https://")
}
