//! Mobile network directory: MSISDN prefix to network and currency

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileNetwork {
    pub id: String,
    pub name: String,
    /// National-format prefixes, e.g. "082"
    pub prefixes: Vec<String>,
    pub currency: String,
}

/// Lookup table of supported networks for one market
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDirectory {
    /// International dialing code without '+', e.g. "27"
    pub country_code: String,
    networks: Vec<MobileNetwork>,
}

impl Default for NetworkDirectory {
    fn default() -> Self {
        let net = |id: &str, name: &str, prefixes: &[&str]| MobileNetwork {
            id: id.to_string(),
            name: name.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            currency: "ZAR".to_string(),
        };

        Self {
            country_code: "27".to_string(),
            networks: vec![
                net("vodacom", "Vodacom M-Pesa", &["082", "083", "084"]),
                net("mtn", "MTN MoMo SA", &["078", "079"]),
                net("cellc", "Cell C", &["084"]),
                net("telkom", "Telkom Mobile", &["081"]),
            ],
        }
    }
}

impl NetworkDirectory {
    pub fn from_loaded(country_code: &str, networks: &[MobileNetwork]) -> Self {
        Self {
            country_code: country_code.to_string(),
            networks: networks.to_vec(),
        }
    }

    pub fn networks(&self) -> &[MobileNetwork] {
        &self.networks
    }

    /// Digits of the number in national format ("0821234567")
    pub fn national_format(&self, phone_number: &str) -> String {
        let digits: String = phone_number.chars().filter(|c| c.is_ascii_digit()).collect();

        if let Some(rest) = digits.strip_prefix(self.country_code.as_str()) {
            if rest.len() >= 9 {
                return format!("0{}", rest);
            }
        }
        if digits.len() == 9 && !digits.starts_with('0') {
            return format!("0{}", digits);
        }
        digits
    }

    /// International format with leading '+'
    pub fn international_format(&self, phone_number: &str) -> String {
        let national = self.national_format(phone_number);
        let subscriber = national.strip_prefix('0').unwrap_or(&national);
        format!("+{}{}", self.country_code, subscriber)
    }

    /// Network serving a number; first listed network wins on shared prefixes
    pub fn detect(&self, phone_number: &str) -> Option<&MobileNetwork> {
        let national = self.national_format(phone_number);
        self.networks
            .iter()
            .find(|n| n.prefixes.iter().any(|p| national.starts_with(p.as_str())))
    }
}
