//! Shipping address normalization and field-level validation. Deterministic
//! and side-effect-free so it can run before submit and again at checkout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw form input; every field optional, whitespace untrimmed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ShippingInput {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub ext_number: String,
    #[serde(default)]
    pub int_number: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub references: String,
}

/// Normalized address as persisted on orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub street: String,
    pub ext_number: String,
    pub int_number: String,
    pub postal_code: String,
    pub references: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Validated {
    pub ok: bool,
    pub errors: BTreeMap<String, String>,
    pub data: ShippingAddress,
}

/// Trim everything, lowercase the email, uppercase the country code and
/// strip whitespace out of the postal code.
pub fn normalize(raw: &ShippingInput) -> ShippingAddress {
    let t = |s: &str| s.trim().to_string();
    ShippingAddress {
        full_name: t(&raw.full_name),
        email: raw.email.trim().to_lowercase(),
        phone: t(&raw.phone),
        country: raw.country.trim().to_uppercase(),
        state: t(&raw.state),
        city: t(&raw.city),
        neighborhood: t(&raw.neighborhood),
        street: t(&raw.street),
        ext_number: t(&raw.ext_number),
        int_number: t(&raw.int_number),
        postal_code: raw
            .postal_code
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect(),
        references: t(&raw.references),
    }
}

pub fn validate(raw: &ShippingInput) -> Validated {
    let data = normalize(raw);
    let mut errors = BTreeMap::new();

    if data.full_name.is_empty() {
        errors.insert("full_name".into(), "Full name is required.".into());
    }
    if data.email.is_empty() || !is_email(&data.email) {
        errors.insert("email".into(), "A valid email is required.".into());
    }
    if data.street.is_empty() {
        errors.insert("street".into(), "Street is required.".into());
    }
    if data.ext_number.is_empty() {
        errors.insert("ext_number".into(), "Exterior number is required.".into());
    }
    if data.city.is_empty() {
        errors.insert("city".into(), "City is required.".into());
    }
    if data.state.is_empty() {
        errors.insert("state".into(), "State or province is required.".into());
    }
    if data.postal_code.is_empty() {
        errors.insert("postal_code".into(), "Postal code is required.".into());
    } else if !is_postal_code(&data.postal_code) {
        errors.insert("postal_code".into(), "Postal code is invalid.".into());
    }
    if data.country.is_empty() {
        errors.insert("country".into(), "Country is required.".into());
    }

    Validated {
        ok: errors.is_empty(),
        errors,
        data,
    }
}

/// `local@domain.tld`, nothing fancier.
pub fn is_email(s: &str) -> bool {
    let mut parts = s.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((name, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !name.is_empty()
        && !tld.is_empty()
        && !domain.chars().any(char::is_whitespace)
}

/// 4 to 10 digits.
fn is_postal_code(s: &str) -> bool {
    (4..=10).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_input() -> ShippingInput {
        ShippingInput {
            full_name: "  Sofía Pérez ".into(),
            email: " Sofia@Example.COM ".into(),
            phone: "555 123 4567".into(),
            country: "mx".into(),
            state: "CDMX".into(),
            city: "Ciudad de México".into(),
            neighborhood: "Roma Norte".into(),
            street: "Av. Insurgentes".into(),
            ext_number: "123".into(),
            int_number: "4B".into(),
            postal_code: " 06 700 ".into(),
            references: "Blue door".into(),
        }
    }

    #[test]
    fn normalization_trims_and_canonicalizes() {
        let data = normalize(&full_input());
        assert_eq!(data.full_name, "Sofía Pérez");
        assert_eq!(data.email, "sofia@example.com");
        assert_eq!(data.country, "MX");
        assert_eq!(data.postal_code, "06700");
    }

    #[test]
    fn complete_input_validates() {
        let result = validate(&full_input());
        assert!(result.ok, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_required_fields_are_reported_per_field() {
        let result = validate(&ShippingInput::default());
        assert!(!result.ok);
        for field in [
            "full_name",
            "email",
            "street",
            "ext_number",
            "city",
            "state",
            "postal_code",
            "country",
        ] {
            assert!(result.errors.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn postal_code_must_be_four_to_ten_digits() {
        let mut input = full_input();
        input.postal_code = "AB12".into();
        assert!(validate(&input).errors.contains_key("postal_code"));

        input.postal_code = "123".into();
        assert!(validate(&input).errors.contains_key("postal_code"));

        input.postal_code = "12345".into();
        assert!(!validate(&input).errors.contains_key("postal_code"));
    }

    #[test]
    fn email_shape_is_checked() {
        for bad in ["", "nope", "a@b", "a @b.com", "a@b.", "@b.com", "a@@b.com"] {
            assert!(!is_email(bad), "{bad:?} should be rejected");
        }
        assert!(is_email("a@b.co"));
        assert!(is_email("first.last@sub.domain.mx"));
    }

    #[test]
    fn validation_is_deterministic() {
        let input = full_input();
        let a = validate(&input);
        let b = validate(&input);
        assert_eq!(a.ok, b.ok);
        assert_eq!(a.errors, b.errors);
        assert_eq!(a.data, b.data);
    }
}
