//! Synthetic shopper data.
//!
//! [`SyntheticData`] produces one plausible value per field category;
//! [`RandomProfile`] draws them from the `fake` crate's English locale.
//! Values only need to pass storefront form validation, not look unique
//! across a run.

use fake::faker::address::en::{BuildingNumber, CityName, SecondaryAddress, StateAbbr, StreetName};
use fake::faker::boolean::en::Boolean;
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Sentences;
use fake::faker::name::en::{FirstName, LastName};
use fake::faker::phone_number::en::PhoneNumber;
use fake::{Dummy, Fake};
use rand::rngs::StdRng;
use rand::Rng;

/// One plausible value per checkout field category.
pub trait SyntheticData: Send {
    fn first_name(&mut self) -> String;
    fn last_name(&mut self) -> String;
    fn company_name(&mut self) -> String;
    /// Two-letter US state code
    fn state_abbr(&mut self) -> String;
    fn street_address(&mut self) -> String;
    fn secondary_address(&mut self) -> String;
    fn city(&mut self) -> String;
    /// ZIP code valid for Delaware
    fn postcode(&mut self) -> String;
    fn phone_number(&mut self) -> String;
    /// Address on a reserved example domain
    fn email(&mut self) -> String;
    fn sentences(&mut self) -> String;
    /// Decides whether an optional field is filled in
    fn boolean(&mut self) -> bool;
}

/// Delaware ZIP range
const ZIP_RANGE: (u32, u32) = (19701, 19980);

/// Sentences per order comment
const COMMENT_SENTENCES: std::ops::Range<usize> = 2..5;

/// [`SyntheticData`] backed by `fake`, replayable from its seed.
#[derive(Debug, Clone)]
pub struct RandomProfile {
    rng: StdRng,
}

impl RandomProfile {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    fn fake<F>(&mut self, faker: F) -> String
    where
        String: Dummy<F>,
    {
        faker.fake_with_rng(&mut self.rng)
    }
}

impl SyntheticData for RandomProfile {
    fn first_name(&mut self) -> String {
        self.fake(FirstName())
    }

    fn last_name(&mut self) -> String {
        self.fake(LastName())
    }

    fn company_name(&mut self) -> String {
        self.fake(CompanyName())
    }

    fn state_abbr(&mut self) -> String {
        self.fake(StateAbbr())
    }

    fn street_address(&mut self) -> String {
        let number = self.fake(BuildingNumber());
        let street = self.fake(StreetName());
        format!("{number} {street}")
    }

    fn secondary_address(&mut self) -> String {
        self.fake(SecondaryAddress())
    }

    fn city(&mut self) -> String {
        self.fake(CityName())
    }

    fn postcode(&mut self) -> String {
        self.rng.random_range(ZIP_RANGE.0..=ZIP_RANGE.1).to_string()
    }

    fn phone_number(&mut self) -> String {
        self.fake(PhoneNumber())
    }

    fn email(&mut self) -> String {
        self.fake(SafeEmail())
    }

    fn sentences(&mut self) -> String {
        let sentences: Vec<String> = Sentences(COMMENT_SENTENCES).fake_with_rng(&mut self.rng);
        sentences.join(" ")
    }

    fn boolean(&mut self) -> bool {
        Boolean(50).fake_with_rng(&mut self.rng)
    }
}
