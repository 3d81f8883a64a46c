//! Synthetic billing data submitted with the checkout form.

use crate::profile::SyntheticData;

/// Billing country sent with every order
pub const BILLING_COUNTRY: &str = "US";

/// Range of the numeric prefix that keeps order emails distinct
pub const EMAIL_PREFIX_RANGE: (u32, u32) = (1, 100);

/// Billing fields for one checkout. Built fresh per iteration.
///
/// `None` in an optional field is expected traffic variety, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFieldSet {
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub country: String,
    pub state: String,
    pub address_1: String,
    pub address_2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub phone: String,
    pub email: String,
    pub order_comments: Option<String>,
}

impl CheckoutFieldSet {
    /// Draw every field from `data`; `email_prefix` is prepended to the
    /// email to avoid duplicate-order collisions.
    pub fn generate(data: &mut dyn SyntheticData, email_prefix: u32) -> Self {
        let first_name = data.first_name();
        let last_name = data.last_name();
        let company = data.boolean().then(|| data.company_name());
        let state = data.state_abbr();
        let address_1 = data.street_address();
        let address_2 = data.boolean().then(|| data.secondary_address());
        let city = data.city();
        let postcode = data.postcode();
        let phone = data.phone_number();
        let email = format!("{email_prefix}-{}", data.email());
        let order_comments = data.boolean().then(|| data.sentences());

        Self {
            first_name,
            last_name,
            company,
            country: BILLING_COUNTRY.to_string(),
            state,
            address_1,
            address_2,
            city,
            postcode,
            phone,
            email,
            order_comments,
        }
    }

    /// Number of optional fields that carry a value
    pub fn optional_fields_present(&self) -> usize {
        [&self.company, &self.address_2, &self.order_comments]
            .iter()
            .filter(|field| field.is_some())
            .count()
    }

    /// WooCommerce checkout field names. Absent optional fields are sent
    /// empty so they clear whatever the form pre-filled.
    pub fn into_form_fields(self) -> Vec<(String, String)> {
        [
            ("billing_first_name", Some(self.first_name)),
            ("billing_last_name", Some(self.last_name)),
            ("billing_company", self.company),
            ("billing_country", Some(self.country)),
            ("billing_state", Some(self.state)),
            ("billing_address_1", Some(self.address_1)),
            ("billing_address_2", self.address_2),
            ("billing_city", Some(self.city)),
            ("billing_postcode", Some(self.postcode)),
            ("billing_phone", Some(self.phone)),
            ("billing_email", Some(self.email)),
            ("order_comments", self.order_comments),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.unwrap_or_default()))
        .collect()
    }
}
