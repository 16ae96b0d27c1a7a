//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Money value object. The store trades in a single currency, so only the amount is carried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn from_units(units: i64) -> Self { Self(Decimal::from(units)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0 + other.0) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "${}", self.0.normalize()) }
}

pub const MIN_CARD_DIGITS: usize = 13;
pub const MAX_CARD_DIGITS: usize = 16;

/// Card number as typed at checkout. Only the digit count is checked: there is no Luhn check
/// and no authorization, the payment is simulated.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(raw: &str) -> Result<Self, CardError> {
        let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) { return Err(CardError::NotNumeric); }
        if !(MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) { return Err(CardError::DigitCount(digits.len())); }
        Ok(Self(digits))
    }

    pub fn last4(&self) -> &str {
        let start = self.0.len().saturating_sub(4);
        self.0.get(start..).unwrap_or_default()
    }

    /// `**** **** **** 1111`. This is the only form of the number that leaves the process.
    pub fn masked(&self) -> String { format!("**** **** **** {}", self.last4()) }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "CardNumber({})", self.masked()) }
}

/// Card expiry in `MM/YY` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardExpiry { month: u8, year: u8 }

impl CardExpiry {
    pub fn parse(raw: &str) -> Result<Self, CardError> {
        let raw = raw.trim();
        let (mm, yy) = raw.split_once('/').ok_or(CardError::ExpiryFormat)?;
        let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
        if !two_digits(mm) || !two_digits(yy) { return Err(CardError::ExpiryFormat); }
        let month: u8 = mm.parse().map_err(|_| CardError::ExpiryFormat)?;
        let year: u8 = yy.parse().map_err(|_| CardError::ExpiryFormat)?;
        if !(1..=12).contains(&month) { return Err(CardError::ExpiryMonth(month)); }
        Ok(Self { month, year })
    }

    pub fn month(&self) -> u8 { self.month }
    pub fn year(&self) -> u8 { self.year }
}

/// Card verification value: 3 or 4 digits.
#[derive(Clone, PartialEq, Eq)]
pub struct Cvv(String);

impl Cvv {
    pub fn parse(raw: &str) -> Result<Self, CardError> {
        let raw = raw.trim();
        if !(3..=4).contains(&raw.len()) || !raw.chars().all(|c| c.is_ascii_digit()) { return Err(CardError::Cvv); }
        Ok(Self(raw.to_string()))
    }
}

impl fmt::Debug for Cvv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Cvv(***)") }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CardError { NotNumeric, DigitCount(usize), ExpiryFormat, ExpiryMonth(u8), Cvv }
impl std::error::Error for CardError {}
impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNumeric => write!(f, "The card number may only contain digits."),
            Self::DigitCount(n) => write!(f, "The card number must have between {MIN_CARD_DIGITS} and {MAX_CARD_DIGITS} digits (got {n})."),
            Self::ExpiryFormat => write!(f, "The expiry date must use the MM/YY format."),
            Self::ExpiryMonth(_) => write!(f, "The expiry month must be between 01 and 12."),
            Self::Cvv => write!(f, "The CVV must have 3 or 4 digits."),
        }
    }
}
