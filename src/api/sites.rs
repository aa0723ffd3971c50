//! Marketplace sites and site-prefixed identifiers

use crate::{AuthError, AuthResult};
use std::fmt;

/// A marketplace site the API serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Argentina,
    Brasil,
    Colombia,
    CostaRica,
    Ecuador,
    Chile,
    Mexico,
    Uruguay,
    Venezuela,
    Panama,
    Peru,
    Portugal,
    Dominicana,
}

impl Site {
    /// Every site with a known authorization host
    pub const ALL: [Site; 13] = [
        Site::Argentina,
        Site::Brasil,
        Site::Colombia,
        Site::CostaRica,
        Site::Ecuador,
        Site::Chile,
        Site::Mexico,
        Site::Uruguay,
        Site::Venezuela,
        Site::Panama,
        Site::Peru,
        Site::Portugal,
        Site::Dominicana,
    ];

    /// Resolves a three-letter site code
    ///
    /// Unknown codes are rejected as an authentication error since no
    /// authorization host exists for them.
    pub fn from_code(code: &str) -> AuthResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|site| site.code() == code)
            .ok_or_else(|| AuthError::InvalidSite(code.to_string()))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Argentina => "MLA",
            Self::Brasil => "MLB",
            Self::Colombia => "MCO",
            Self::CostaRica => "MCR",
            Self::Ecuador => "MEC",
            Self::Chile => "MLC",
            Self::Mexico => "MLM",
            Self::Uruguay => "MLU",
            Self::Venezuela => "MLV",
            Self::Panama => "MPA",
            Self::Peru => "MPE",
            Self::Portugal => "MPT",
            Self::Dominicana => "MRD",
        }
    }

    /// Base URL of the site's OAuth authorization server
    pub fn auth_base(&self) -> &'static str {
        match self {
            Self::Argentina => "https://auth.mercadolibre.com.ar",
            Self::Brasil => "https://auth.mercadolivre.com.br",
            Self::Colombia => "https://auth.mercadolibre.com.co",
            Self::CostaRica => "https://auth.mercadolibre.com.cr",
            Self::Ecuador => "https://auth.mercadolibre.com.ec",
            Self::Chile => "https://auth.mercadolibre.cl",
            Self::Mexico => "https://auth.mercadolibre.com.mx",
            Self::Uruguay => "https://auth.mercadolibre.com.uy",
            Self::Venezuela => "https://auth.mercadolibre.com.ve",
            Self::Panama => "https://auth.mercadolibre.com.pa",
            Self::Peru => "https://auth.mercadolibre.com.pe",
            Self::Portugal => "https://auth.mercadolibre.com.pt",
            Self::Dominicana => "https://auth.mercadolibre.com.do",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Splits a site-prefixed id ("MLB1384") into its site code and local part
///
/// Returns None when the id is too short to carry a prefix.
pub fn split_site_prefix(id: &str) -> Option<(&str, &str)> {
    if id.len() <= 3 || !id.is_char_boundary(3) {
        return None;
    }
    Some(id.split_at(3))
}

/// A category id such as "MLB1384", validated against the site registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryId {
    site: Site,
    raw: String,
}

impl CategoryId {
    /// Parses a category id, rejecting unknown site prefixes before any
    /// request is made
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let (code, _) = split_site_prefix(raw).ok_or_else(|| AuthError::InvalidSite(raw.to_string()))?;
        let site = Site::from_code(code)?;
        Ok(Self {
            site,
            raw: raw.to_string(),
        })
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The id without its site prefix, as stored in the database
    pub fn local_id(&self) -> &str {
        &self.raw[3..]
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
